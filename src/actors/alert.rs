//! AlertActor - Delivers view transitions to alert targets
//!
//! The actor subscribes to the [`ViewAlertEvent`] broadcast published by the
//! MonitorActor and fans every event out to the alert targets configured for
//! the affected view.
//!
//! ## Muting
//!
//! ```text
//! MuteAlerts { duration_secs } → events are counted as suppressed
//!                               until the duration elapses
//! UnmuteAlerts                 → deliveries resume immediately
//! ```
//!
//! Delivery failures are logged and counted, never retried.

use std::collections::HashMap;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, instrument, warn};

use crate::alerts::AlertManager;
use crate::config::{Alert, ViewConfig};

use super::messages::{AlertCommand, AlertStats, ViewAlertEvent};

/// Actor that sends alerts for view transitions
pub struct AlertActor {
    /// Alert targets per view name
    targets: HashMap<String, Vec<Alert>>,

    /// Alert manager for sending notifications
    alert_manager: AlertManager,

    /// Command receiver
    command_rx: mpsc::Receiver<AlertCommand>,

    /// View alert receiver (broadcast subscription)
    event_rx: broadcast::Receiver<ViewAlertEvent>,

    /// Deliveries are suppressed until this instant
    muted_until: Option<Instant>,

    stats: AlertStats,
}

impl AlertActor {
    /// Create a new alert actor
    pub fn new(
        command_rx: mpsc::Receiver<AlertCommand>,
        event_rx: broadcast::Receiver<ViewAlertEvent>,
    ) -> Self {
        Self {
            targets: HashMap::new(),
            alert_manager: AlertManager::new(),
            command_rx,
            event_rx,
            muted_until: None,
            stats: AlertStats::default(),
        }
    }

    /// Register the alert targets of a view
    pub fn register_view(&mut self, config: ViewConfig) {
        if config.alerts.is_empty() {
            return;
        }
        self.targets.insert(config.name, config.alerts);
    }

    /// Run the actor's main loop
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting alert actor");

        loop {
            tokio::select! {
                result = self.event_rx.recv() => {
                    match result {
                        Ok(event) => self.handle_event(event).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("alert actor lagged, skipped {skipped} view alerts");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            warn!("view alert channel closed, shutting down");
                            break;
                        }
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        AlertCommand::MuteAlerts { duration_secs } => {
                            debug!("muting alerts for {duration_secs}s");
                            self.muted_until =
                                Some(Instant::now() + Duration::from_secs(duration_secs));
                        }

                        AlertCommand::UnmuteAlerts => {
                            debug!("unmuting alerts");
                            self.muted_until = None;
                        }

                        AlertCommand::GetStats { respond_to } => {
                            let stats = AlertStats {
                                muted: self.is_muted(),
                                ..self.stats.clone()
                            };
                            let _ = respond_to.send(stats);
                        }

                        AlertCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("alert actor stopped");
    }

    fn is_muted(&mut self) -> bool {
        match self.muted_until {
            Some(until) if Instant::now() < until => true,
            Some(_) => {
                debug!("mute period elapsed");
                self.muted_until = None;
                false
            }
            None => false,
        }
    }

    #[instrument(skip(self, event), fields(view = %event.view.name))]
    async fn handle_event(&mut self, event: ViewAlertEvent) {
        self.stats.received += 1;

        if self.is_muted() {
            debug!("alerts muted, suppressing {} -> {}", event.previous, event.current);
            self.stats.suppressed += 1;
            return;
        }

        let Some(targets) = self.targets.get(&event.view.name) else {
            debug!("no alert targets configured");
            return;
        };

        let results = join_all(
            targets
                .iter()
                .map(|alert| self.alert_manager.send_view_alert(alert, &event)),
        )
        .await;

        for result in results {
            match result {
                Ok(()) => self.stats.delivered += 1,
                Err(e) => {
                    error!("alert delivery failed: {:#}", e);
                    self.stats.failed += 1;
                }
            }
        }
    }
}

/// Handle for communicating with the AlertActor
#[derive(Clone)]
pub struct AlertHandle {
    sender: mpsc::Sender<AlertCommand>,
}

impl AlertHandle {
    /// Spawn a new alert actor
    ///
    /// # Arguments
    /// - `views`: View configurations; only views with alerts are kept
    /// - `event_rx`: Broadcast receiver for view alert events
    pub fn spawn(views: Vec<ViewConfig>, event_rx: broadcast::Receiver<ViewAlertEvent>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let mut actor = AlertActor::new(cmd_rx, event_rx);
        for config in views {
            actor.register_view(config);
        }

        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Mute alerts for a duration
    pub async fn mute_alerts(&self, duration_secs: u64) {
        let _ = self
            .sender
            .send(AlertCommand::MuteAlerts { duration_secs })
            .await;
    }

    /// Unmute alerts
    pub async fn unmute_alerts(&self) {
        let _ = self.sender.send(AlertCommand::UnmuteAlerts).await;
    }

    /// Get delivery statistics, `None` if the actor is gone
    pub async fn get_stats(&self) -> Option<AlertStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(AlertCommand::GetStats { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }

    /// Shutdown the alert actor
    pub async fn shutdown(&self) {
        let _ = self.sender.send(AlertCommand::Shutdown).await;
    }
}

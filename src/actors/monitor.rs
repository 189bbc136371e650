//! MonitorActor - Owns every service and view
//!
//! This actor is the only place where service and view state is mutated.
//! Producers (HTTP handlers, the CLI, tests) talk to it through a
//! [`MonitorHandle`]; alert-worthy view transitions leave it as
//! [`ViewAlertEvent`]s on a broadcast channel.
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick (1s) ──┐
//! Upserts ──────────┤
//! Deletes ──────────┼─→ StateEngine → StorageBackend
//! Queries ──────────┤        │
//! Control ──────────┘        └─→ ViewAlertEvent → [AlertActor, ...]
//! ```
//!
//! Each input has its own bounded queue so a flood of beats cannot starve
//! queries or deletes. Ordering is FIFO per queue only.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{debug, error, instrument, warn};

use crate::monitors::StateEngine;
use crate::storage::StorageBackend;
use crate::{ServiceSnapshot, ViewSnapshot};

use super::messages::{MonitorControl, MonitorQuery, MonitorStats, UpsertService, ViewAlertEvent};

/// Capacity of the upsert queue
pub const MAX_UNPROCESSED_BEATS: usize = 1000;

/// Capacity of the delete, query and control queues
pub const COMMAND_QUEUE_SIZE: usize = 5;

/// How often services are re-evaluated
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound for a query round trip, enforced by the handle
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Why an upsert could not be queued
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertError {
    /// Too many unprocessed upserts; carries the service name
    QueueFull(String),

    /// The actor has stopped
    Closed,
}

impl fmt::Display for UpsertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpsertError::QueueFull(name) => {
                write!(f, "upsert queue full, dropping update for '{}'", name)
            }
            UpsertError::Closed => write!(f, "monitor actor is gone"),
        }
    }
}

impl std::error::Error for UpsertError {}

/// Actor driving a [`StateEngine`]
pub struct MonitorActor {
    engine: StateEngine,
    upsert_rx: mpsc::Receiver<UpsertService>,
    delete_rx: mpsc::Receiver<String>,
    query_rx: mpsc::Receiver<MonitorQuery>,
    control_rx: mpsc::Receiver<MonitorControl>,
}

impl MonitorActor {
    /// Run the actor's main loop
    ///
    /// Loads the stored state first, then runs until:
    /// - A Shutdown command is received
    /// - Every handle has been dropped
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting monitor actor");

        if let Err(e) = self.engine.reload().await {
            error!("failed to load stored state, starting empty: {}", e);
        }

        let mut ticker = interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.engine.tick(Utc::now()).await;
                }

                command = self.upsert_rx.recv() => {
                    let Some(command) = command else {
                        warn!("all handles dropped, shutting down");
                        break;
                    };
                    self.engine.upsert_service(command, Utc::now()).await;
                }

                Some(name) = self.delete_rx.recv() => {
                    self.engine.delete_service(&name, Utc::now()).await;
                }

                Some(query) = self.query_rx.recv() => {
                    self.answer(query);
                }

                Some(control) = self.control_rx.recv() => {
                    match control {
                        MonitorControl::Reload { respond_to } => {
                            debug!("received Reload command");
                            if let Err(e) = self.engine.reload().await {
                                error!("reload failed, keeping current state: {}", e);
                            }
                            let _ = respond_to.send(());
                        }

                        MonitorControl::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }
            }
        }

        debug!("monitor actor stopped");
    }

    fn answer(&self, query: MonitorQuery) {
        // a dropped receiver means the caller timed out
        match query {
            MonitorQuery::GetServices { view, respond_to } => {
                let _ = respond_to.send(self.engine.services_in_view(&view));
            }
            MonitorQuery::GetService { name, respond_to } => {
                let _ = respond_to.send(self.engine.service(&name));
            }
            MonitorQuery::GetViews { respond_to } => {
                let _ = respond_to.send(self.engine.views());
            }
            MonitorQuery::GetView { name, respond_to } => {
                let _ = respond_to.send(self.engine.view(&name));
            }
            MonitorQuery::GetStats { respond_to } => {
                let _ = respond_to.send(self.engine.stats());
            }
        }
    }
}

/// Handle for communicating with the MonitorActor
///
/// Cheap to clone; every clone feeds the same actor.
#[derive(Clone)]
pub struct MonitorHandle {
    upsert_tx: mpsc::Sender<UpsertService>,
    delete_tx: mpsc::Sender<String>,
    query_tx: mpsc::Sender<MonitorQuery>,
    control_tx: mpsc::Sender<MonitorControl>,
}

impl MonitorHandle {
    /// Spawn a new monitor actor
    pub fn spawn(
        backend: Arc<dyn StorageBackend>,
        alert_tx: broadcast::Sender<ViewAlertEvent>,
        history_capacity: usize,
    ) -> Self {
        let (upsert_tx, upsert_rx) = mpsc::channel(MAX_UNPROCESSED_BEATS);
        let (delete_tx, delete_rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
        let (query_tx, query_rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
        let (control_tx, control_rx) = mpsc::channel(COMMAND_QUEUE_SIZE);

        let actor = MonitorActor {
            engine: StateEngine::new(backend, alert_tx, history_capacity),
            upsert_rx,
            delete_rx,
            query_rx,
            control_rx,
        };

        tokio::spawn(actor.run());

        Self {
            upsert_tx,
            delete_tx,
            query_tx,
            control_tx,
        }
    }

    /// Queue a create-or-update without waiting for it to be applied
    ///
    /// Fails immediately when the upsert queue is full.
    pub fn upsert(&self, command: UpsertService) -> Result<(), UpsertError> {
        self.upsert_tx.try_send(command).map_err(|e| match e {
            TrySendError::Full(command) => UpsertError::QueueFull(command.name),
            TrySendError::Closed(_) => UpsertError::Closed,
        })
    }

    /// Queue a plain beat for `name`
    pub fn beat(&self, name: impl Into<String>) -> Result<(), UpsertError> {
        self.upsert(UpsertService::beat(name))
    }

    pub async fn delete_service(&self, name: impl Into<String>) -> Result<()> {
        self.delete_tx
            .send(name.into())
            .await
            .context("monitor actor is gone")
    }

    pub async fn get_services(&self, view: impl Into<String>) -> Result<Vec<ServiceSnapshot>> {
        let view = view.into();
        self.query(|respond_to| MonitorQuery::GetServices { view, respond_to })
            .await
    }

    pub async fn get_service(&self, name: impl Into<String>) -> Result<Option<ServiceSnapshot>> {
        let name = name.into();
        self.query(|respond_to| MonitorQuery::GetService { name, respond_to })
            .await
    }

    pub async fn get_views(&self) -> Result<Vec<ViewSnapshot>> {
        self.query(|respond_to| MonitorQuery::GetViews { respond_to })
            .await
    }

    pub async fn get_view(&self, name: impl Into<String>) -> Result<Option<ViewSnapshot>> {
        let name = name.into();
        self.query(|respond_to| MonitorQuery::GetView { name, respond_to })
            .await
    }

    pub async fn get_stats(&self) -> Result<MonitorStats> {
        self.query(|respond_to| MonitorQuery::GetStats { respond_to })
            .await
    }

    /// Reload from the backend and wait until it is done
    pub async fn reload(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.control_tx
            .send(MonitorControl::Reload { respond_to: tx })
            .await
            .context("monitor actor is gone")?;
        rx.await.context("monitor actor dropped the reload")
    }

    /// Shut down the monitor actor
    pub async fn shutdown(&self) {
        let _ = self.control_tx.send(MonitorControl::Shutdown).await;
    }

    async fn query<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> MonitorQuery,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();

        timeout(QUERY_TIMEOUT, async {
            self.query_tx
                .send(build(tx))
                .await
                .map_err(|_| anyhow!("monitor actor is gone"))?;
            rx.await.context("monitor actor dropped the query")
        })
        .await
        .map_err(|_| anyhow!("query timed out after {}s", QUERY_TIMEOUT.as_secs()))?
    }
}

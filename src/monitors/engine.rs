//! StateEngine - the owned state behind the MonitorActor
//!
//! Holds every known service and view, evaluates transitions, persists
//! `(previous, current)` snapshot pairs and publishes view alerts. The engine
//! is plain single-owner state: the actor drives it, tests drive it directly
//! with fixed timestamps.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::actors::messages::{MonitorStats, UpsertService, ViewAlertEvent};
use crate::storage::{StorageBackend, StorageResult};
use crate::{ServiceSnapshot, State, ViewSnapshot};

use super::service::Service;
use super::view::{ALL_VIEW, View};

pub struct StateEngine {
    backend: Arc<dyn StorageBackend>,
    alert_tx: broadcast::Sender<ViewAlertEvent>,
    services: HashMap<String, Service>,
    views: HashMap<String, View>,
    history_capacity: usize,
    stats: MonitorStats,
}

impl StateEngine {
    /// Create an empty engine. Call [`StateEngine::reload`] to load stored state.
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        alert_tx: broadcast::Sender<ViewAlertEvent>,
        history_capacity: usize,
    ) -> Self {
        Self {
            backend,
            alert_tx,
            services: HashMap::new(),
            views: HashMap::from([(ALL_VIEW.to_string(), View::all())]),
            history_capacity,
            stats: MonitorStats::default(),
        }
    }

    /// Replace the in-memory state with what the backend holds
    ///
    /// Views whose pattern does not compile are dropped. Every view is then
    /// recomputed against the loaded services; changes are persisted but not
    /// alerted. On a load failure the current state is kept.
    #[instrument(skip(self))]
    pub async fn reload(&mut self) -> StorageResult<()> {
        let stored_services = self.backend.load_services().await?;
        let stored_views = self.backend.load_views().await?;

        let services = stored_services
            .into_iter()
            .map(|snapshot| {
                (
                    snapshot.name.clone(),
                    Service::from_snapshot(snapshot, self.history_capacity),
                )
            })
            .collect::<HashMap<_, _>>();

        let mut all = View::all();
        let mut views = HashMap::new();
        for snapshot in stored_views {
            if snapshot.name == ALL_VIEW {
                all.restore(&snapshot);
                continue;
            }

            let name = snapshot.name.clone();
            match View::from_snapshot(snapshot) {
                Ok(view) => {
                    views.insert(name, view);
                }
                Err(e) => error!("view '{}': dropping, invalid pattern: {}", name, e),
            }
        }
        views.insert(ALL_VIEW.to_string(), all);

        self.services = services;
        self.views = views;

        for (previous, current) in self.recompute_views(|_| true) {
            debug!(
                "view '{}': {} -> {} after reload",
                current.name, previous.state, current.state
            );
            self.persist_view(&previous, &current).await;
        }

        info!(
            "loaded {} services and {} views",
            self.services.len(),
            self.views.len()
        );
        Ok(())
    }

    /// Create or update a service and re-evaluate it at `now`
    #[instrument(skip(self, command), fields(service = %command.name))]
    pub async fn upsert_service(&mut self, command: UpsertService, now: DateTime<Utc>) {
        self.stats.upserts += 1;

        let created = !self.services.contains_key(&command.name);
        let history_capacity = self.history_capacity;
        let service = self
            .services
            .entry(command.name.clone())
            .or_insert_with(|| Service::new(&command.name, history_capacity));
        if created {
            info!("new service");
            self.stats.services_created += 1;
        }

        let previous = service.snapshot();

        // timeouts go first: a switch into auto keeps the beat sent along with it
        if !service.configure_timeouts(command.warning_timeout, command.error_timeout) {
            warn!(
                "ignoring timeouts (warning {:?}, error {:?}): error would fire before warning \
                 (current warning {}, error {})",
                command.warning_timeout,
                command.error_timeout,
                previous.warning_timeout,
                previous.error_timeout
            );
            self.stats.rejected_timeouts += 1;
        }
        if let Some(paused) = command.paused {
            service.set_paused(paused);
        }
        if command.register_beat {
            trace!("beat at {now}");
            service.register_beat(now);
            self.stats.beats += 1;
        }

        if service.update(now) {
            self.stats.state_changes += 1;
            if !created {
                info!("{} -> {}", previous.state, service.state());
            }
        }

        let current = service.snapshot();
        self.persist_service(&previous, &current).await;
        self.update_views(&command.name, now).await;
    }

    /// Forget a service and recompute the views that contained it
    #[instrument(skip(self))]
    pub async fn delete_service(&mut self, name: &str, now: DateTime<Utc>) {
        if self.services.remove(name).is_some() {
            info!("service deleted");
            self.stats.services_deleted += 1;
        } else {
            debug!("deleting unknown service");
        }

        if let Err(e) = self.backend.delete_service(name).await {
            error!("failed to delete stored service: {}", e);
            self.stats.storage_errors += 1;
        }

        self.update_views(name, now).await;
    }

    /// Re-evaluate every active service at `now`
    ///
    /// Returns the number of services that changed state. Paused services and
    /// services without a due transition cause no backend write.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> usize {
        self.stats.ticks += 1;

        let mut due = self
            .services
            .values()
            .filter(|s| s.state() != State::Paused && s.state_at(now) != s.state())
            .map(|s| s.name().to_string())
            .collect::<Vec<_>>();
        due.sort();

        for name in &due {
            let Some(service) = self.services.get_mut(name) else {
                continue;
            };
            let previous = service.snapshot();
            service.update(now);
            let current = service.snapshot();

            info!(
                "service '{}': {} -> {} (incident #{})",
                name, previous.state, current.state, current.incident_nbr
            );
            self.stats.state_changes += 1;

            self.persist_service(&previous, &current).await;
            self.update_views(name, now).await;
        }

        due.len()
    }

    /// Services matching `view`, sorted by name. Unknown views match nothing.
    pub fn services_in_view(&self, view: &str) -> Vec<ServiceSnapshot> {
        let Some(view) = self.views.get(view) else {
            return vec![];
        };

        let mut services = self
            .services
            .values()
            .filter(|s| view.contains(s.name()))
            .map(Service::snapshot)
            .collect::<Vec<_>>();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        services
    }

    pub fn service(&self, name: &str) -> Option<ServiceSnapshot> {
        self.services.get(name).map(Service::snapshot)
    }

    /// All views, sorted by name
    pub fn views(&self) -> Vec<ViewSnapshot> {
        let mut views = self.views.values().map(View::snapshot).collect::<Vec<_>>();
        views.sort_by(|a, b| a.name.cmp(&b.name));
        views
    }

    pub fn view(&self, name: &str) -> Option<ViewSnapshot> {
        self.views.get(name).map(View::snapshot)
    }

    pub fn stats(&self) -> MonitorStats {
        MonitorStats {
            services: self.services.len(),
            views: self.views.len(),
            ..self.stats.clone()
        }
    }

    /// Recompute the views containing `service_name`, persisting and alerting
    async fn update_views(&mut self, service_name: &str, now: DateTime<Utc>) {
        for (previous, current) in self.recompute_views(|view| view.contains(service_name)) {
            self.stats.view_changes += 1;
            info!(
                "view '{}': {} -> {} (incident #{})",
                current.name, previous.state, current.state, current.incident_nbr
            );

            self.persist_view(&previous, &current).await;

            let alert = self
                .views
                .get(&current.name)
                .is_some_and(|view| view.has_alert(&previous));
            if alert {
                self.publish_alert(previous.state, current, now);
            }
        }
    }

    /// Update the selected views, returning the snapshot pairs of those that changed
    fn recompute_views(
        &mut self,
        selected: impl Fn(&View) -> bool,
    ) -> Vec<(ViewSnapshot, ViewSnapshot)> {
        let services = &self.services;

        let mut changes = self
            .views
            .values_mut()
            .filter(|view| selected(view))
            .filter_map(|view| {
                let previous = view.snapshot();
                view.update(services.values())
                    .then(|| (previous, view.snapshot()))
            })
            .collect::<Vec<_>>();
        changes.sort_by(|a, b| a.1.name.cmp(&b.1.name));
        changes
    }

    fn publish_alert(&mut self, previous: State, view: ViewSnapshot, now: DateTime<Utc>) {
        let event = ViewAlertEvent {
            current: view.state,
            previous,
            view,
            timestamp: now,
        };

        match self.alert_tx.send(event) {
            Ok(receivers) => {
                trace!("alert published to {receivers} subscribers");
                self.stats.alerts_published += 1;
            }
            Err(_) => warn!("no alert subscribers, dropping alert"),
        }
    }

    async fn persist_service(&mut self, previous: &ServiceSnapshot, current: &ServiceSnapshot) {
        if let Err(e) = self.backend.save_service(previous, current).await {
            error!("failed to save service '{}': {}", current.name, e);
            self.stats.storage_errors += 1;
        }
    }

    async fn persist_view(&mut self, previous: &ViewSnapshot, current: &ViewSnapshot) {
        if let Err(e) = self.backend.save_view(previous, current).await {
            error!("failed to save view '{}': {}", current.name, e);
            self.stats.storage_errors += 1;
        }
    }
}

use crate::config::BoardConfig;
use crate::core::{
    cache::ResponseCache,
    category::Category,
    events::{FeedEvent, Request, Timer},
    machine::LeaderboardMachine,
    supervisor::ReconnectSupervisor,
};
use crate::storage::DatasetStore;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// All mutable state of one leaderboard instance. Every change happens through
/// `&mut self` within a single turn; side effects are queued as `Request`s.
#[derive(Debug)]
pub struct Board {
    pub(crate) config: BoardConfig,
    pub(crate) machine: LeaderboardMachine,
    pub(crate) supervisor: ReconnectSupervisor,
    pub(crate) cache: ResponseCache,
    outbox: Vec<Request>,
    pub(crate) started_at: DateTime<Utc>,
}

impl Board {
    pub fn new(config: BoardConfig, now: DateTime<Utc>) -> Self {
        Board {
            machine: LeaderboardMachine::new(
                config.page_size,
                config.label_settle_delay,
                config.arrival_interact_delay,
            ),
            supervisor: ReconnectSupervisor::new(
                config.reconnect_base_delay,
                config.max_reconnect_attempts,
            ),
            cache: ResponseCache::new(),
            outbox: Vec::new(),
            started_at: now,
            config,
        }
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn machine(&self) -> &LeaderboardMachine {
        &self.machine
    }

    pub fn supervisor(&self) -> &ReconnectSupervisor {
        &self.supervisor
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ResponseCache {
        &mut self.cache
    }

    pub fn store(&self) -> &DatasetStore {
        self.machine.store()
    }

    /// Requests queued since the last call, in order.
    pub fn take_requests(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.outbox)
    }

    /// Starts the feed, or restarts it after reconnection gave up.
    pub fn start(&mut self) {
        let requests = self.supervisor.start();
        self.outbox.extend(requests);
    }

    pub fn shutdown(&mut self, reason: &str) {
        let requests = self.supervisor.stop(reason);
        self.outbox.extend(requests);
    }

    pub fn on_feed_event(&mut self, event: FeedEvent, now: DateTime<Utc>) {
        debug!("Feed event: {}", event);
        match &event {
            FeedEvent::Connected => {
                info!("Feed connected.");
                self.supervisor.on_connected();
            }
            FeedEvent::Disconnected { reason } => {
                if let Some(request) = self.supervisor.on_disconnected(reason) {
                    self.outbox.push(request);
                }
            }
            _ => {}
        }

        let step = self.machine.handle(event, now);
        if let Some(category) = step.committed {
            let purged = self.cache.invalidate_category(category);
            debug!("Purged {} cached responses of {}", purged, category);
        }
        self.outbox.extend(step.requests);
    }

    pub fn on_timer(&mut self, timer: Timer) {
        let requests = match timer {
            Timer::Reconnect { attempt } => self.supervisor.on_reconnect_due(attempt),
            Timer::AdvanceCategory { .. } if self.supervisor.is_connected() => {
                self.machine.on_timer(timer)
            }
            Timer::AdvanceCategory { .. } => vec![],
        };
        self.outbox.extend(requests);
    }

    /// Ages out freshness of old datasets. Purely passive: no revisit is requested.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> Vec<Category> {
        let max_age = self.config.max_data_age;
        self.machine.store_mut().sweep(now, max_age)
    }

    pub fn purge_cache(&mut self, now: DateTime<Utc>) -> usize {
        self.cache.purge_expired(now)
    }

    pub fn is_stale(&self, category: Category, now: DateTime<Utc>) -> bool {
        self.store()
            .is_stale(category, now, self.config.fresh_window)
    }

    /// Asks for fresher data of `category` without waiting for it.
    pub fn trigger_refresh(&mut self, category: Category) {
        let requests = match self.supervisor.is_connected() {
            true => self.machine.refresh(category),
            false => self.supervisor.ensure_started(),
        };
        self.outbox.extend(requests);
    }
}

use crate::core::{
    buffer::AccumulationBuffer,
    category::Category,
    events::{FeedEvent, LabelSource, Request, Timer},
    record::PlayerRecord,
};
use crate::storage::DatasetStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "category", rename_all = "snake_case")]
pub enum Phase {
    AwaitingLabel,
    Scraping(Category),
    Settling(Category),
}

/// Outcome of one event.
#[derive(Debug, Default, PartialEq)]
pub struct Step {
    pub requests: Vec<Request>,
    pub committed: Option<Category>,
}

/// Infers the visible category from selector labels, stages board lines and
/// commits them, and drives the rotation through the selector.
#[derive(Debug)]
pub struct LeaderboardMachine {
    phase: Phase,
    store: DatasetStore,
    buffer: AccumulationBuffer,
    arrived: bool,
    // Last selector seen and the category it showed.
    label: Option<(Category, LabelSource)>,
    // Advance timers carry the generation they were scheduled in.
    generation: u64,
    settle_delay: Duration,
    arrival_delay: Duration,
}

impl LeaderboardMachine {
    pub fn new(page_size: usize, settle_delay: Duration, arrival_delay: Duration) -> Self {
        LeaderboardMachine {
            phase: Phase::AwaitingLabel,
            store: DatasetStore::new(),
            buffer: AccumulationBuffer::new(page_size),
            arrived: false,
            label: None,
            generation: 0,
            settle_delay,
            arrival_delay,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut DatasetStore {
        &mut self.store
    }

    pub fn buffer(&self) -> &AccumulationBuffer {
        &self.buffer
    }

    pub fn has_arrived(&self) -> bool {
        self.arrived
    }

    pub fn handle(&mut self, event: FeedEvent, now: DateTime<Utc>) -> Step {
        match event {
            FeedEvent::LabelObserved { text, source } => self.on_label(&text, source, now),
            FeedEvent::DataLineObserved { text } => {
                self.on_data_line(&text, now);
                Step::default()
            }
            FeedEvent::ArrivedAtGoal => Step {
                requests: self.on_arrived(),
                committed: None,
            },
            FeedEvent::Connected | FeedEvent::Disconnected { .. } => {
                self.reset();
                Step::default()
            }
        }
    }

    pub fn on_timer(&mut self, timer: Timer) -> Vec<Request> {
        match timer {
            Timer::AdvanceCategory { generation } => self.on_advance_due(generation),
            Timer::Reconnect { .. } => vec![],
        }
    }

    /// Walks back to the board if we are connected but not standing at it.
    /// While a rotation is running, the next pass refreshes every category anyway.
    pub fn refresh(&mut self, category: Category) -> Vec<Request> {
        match (&self.label, self.arrived) {
            (Some((_, source)), false) => {
                info!("Refreshing {}, heading back to the board.", category);
                vec![Request::MoveTo(source.position)]
            }
            (None, _) => {
                debug!("Refresh of {} requested before any label was seen.", category);
                vec![]
            }
            (Some(_), true) => {
                debug!("Refresh of {} requested mid-cycle, nothing to do.", category);
                vec![]
            }
        }
    }

    fn on_label(&mut self, text: &str, source: LabelSource, now: DateTime<Utc>) -> Step {
        let category = match Category::from_label(text) {
            Some(category) => category,
            None => {
                warn!("Unrecognized selector label {:?}, ignoring it.", text);
                return Step::default();
            }
        };

        if let Phase::Scraping(expected) = self.phase {
            if expected != category {
                warn!("Expected {} after rotating, the board shows {}.", expected, category);
            }
        }

        let committed = self.commit(category, now);
        self.label = Some((category, source));

        if !self.arrived {
            return Step {
                requests: vec![Request::MoveTo(source.position)],
                committed,
            };
        }

        // Same board still on screen: the pending advance stands.
        if self.phase == Phase::Settling(category) {
            return Step {
                requests: vec![],
                committed,
            };
        }

        Step {
            requests: vec![self.settle(category, self.settle_delay)],
            committed,
        }
    }

    fn on_data_line(&mut self, text: &str, now: DateTime<Utc>) {
        match PlayerRecord::from_line(text, now) {
            Some(record) => self.buffer.push(record),
            None => debug!("Not a board line: {:?}", text),
        }
    }

    fn on_arrived(&mut self) -> Vec<Request> {
        self.arrived = true;
        match self.label {
            Some((category, _)) => vec![self.settle(category, self.arrival_delay)],
            None => {
                warn!("Arrived, but no leaderboard label was seen.");
                vec![]
            }
        }
    }

    fn on_advance_due(&mut self, generation: u64) -> Vec<Request> {
        if generation != self.generation {
            return vec![];
        }
        match (self.phase, &self.label) {
            (Phase::Settling(category), Some((_, source))) => {
                self.phase = Phase::Scraping(category.next());
                vec![Request::InteractWith(source.entity)]
            }
            _ => vec![],
        }
    }

    fn settle(&mut self, category: Category, after: Duration) -> Request {
        self.phase = Phase::Settling(category);
        self.generation += 1;
        Request::Schedule {
            after,
            timer: Timer::AdvanceCategory {
                generation: self.generation,
            },
        }
    }

    fn commit(&mut self, category: Category, now: DateTime<Utc>) -> Option<Category> {
        if self.buffer.is_empty() {
            return None;
        }
        let records = self.buffer.take();
        info!(
            "Updating {} leaderboard with {} players",
            category,
            records.len()
        );
        self.store.commit(category, records, now);
        Some(category)
    }

    fn reset(&mut self) {
        if !self.buffer.is_empty() {
            debug!(
                "Dropping {} uncommitted entries on connection change.",
                self.buffer.len()
            );
        }
        self.buffer.clear();
        self.phase = Phase::AwaitingLabel;
        self.arrived = false;
        self.label = None;
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::{EntityId, Position};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn machine() -> LeaderboardMachine {
        LeaderboardMachine::new(10, Duration::from_secs(30), Duration::from_secs(1))
    }

    fn source() -> LabelSource {
        LabelSource {
            entity: EntityId(42),
            position: Position {
                x: 10.5,
                y: 70.0,
                z: -4.5,
            },
        }
    }

    fn label(category: Category) -> FeedEvent {
        FeedEvent::LabelObserved {
            text: category.label().to_string(),
            source: source(),
        }
    }

    fn line(text: &str) -> FeedEvent {
        FeedEvent::DataLineObserved {
            text: text.to_string(),
        }
    }

    fn advance_generation(requests: &[Request]) -> u64 {
        match requests {
            [Request::Schedule {
                timer: Timer::AdvanceCategory { generation },
                ..
            }] => *generation,
            other => panic!("expected an advance timer, got {other:?}"),
        }
    }

    #[test]
    fn first_label_walks_to_the_board() {
        let mut m = machine();
        let step = m.handle(label(Category::Lifetime), now());

        assert_eq!(step.requests, vec![Request::MoveTo(source().position)]);
        assert_eq!(step.committed, None);
        assert_eq!(m.phase(), Phase::AwaitingLabel);

        // Seeing it again before arriving is harmless.
        let again = m.handle(label(Category::Lifetime), now());
        assert_eq!(again.requests, step.requests);
    }

    #[test]
    fn arrival_kicks_off_the_rotation() {
        let mut m = machine();
        m.handle(label(Category::Lifetime), now());
        let requests = m.handle(FeedEvent::ArrivedAtGoal, now()).requests;

        let generation = advance_generation(&requests);
        assert!(matches!(
            requests[0],
            Request::Schedule { after, .. } if after == Duration::from_secs(1)
        ));
        assert_eq!(m.phase(), Phase::Settling(Category::Lifetime));

        let interact = m.on_timer(Timer::AdvanceCategory { generation });
        assert_eq!(interact, vec![Request::InteractWith(EntityId(42))]);
        assert_eq!(m.phase(), Phase::Scraping(Category::Monthly));
    }

    #[test]
    fn label_commits_buffered_lines_into_its_category() {
        let mut m = machine();
        m.handle(line("#1 PlayerA (5 Hours)"), now());
        m.handle(line("garbage"), now());
        m.handle(line("#2 PlayerB [Guild1] (3 Hours)"), now());

        let step = m.handle(label(Category::Monthly), now());

        assert_eq!(step.committed, Some(Category::Monthly));
        let dataset = m.store().get(Category::Monthly);
        assert_eq!(dataset.records.len(), 2);
        assert_eq!(dataset.last_commit_at, Some(now()));
        assert!(m.buffer().is_empty());
    }

    #[test]
    fn settled_labels_schedule_the_next_advance() {
        let mut m = machine();
        m.handle(label(Category::Lifetime), now());
        m.handle(FeedEvent::ArrivedAtGoal, now());

        m.handle(line("#1 PlayerA (5 Hours)"), now());
        let step = m.handle(label(Category::Monthly), now());

        assert_eq!(step.committed, Some(Category::Monthly));
        assert!(matches!(
            step.requests[0],
            Request::Schedule { after, .. } if after == Duration::from_secs(30)
        ));
        assert_eq!(m.phase(), Phase::Settling(Category::Monthly));
    }

    #[test]
    fn repeated_labels_keep_the_pending_advance() {
        let mut m = machine();
        m.handle(label(Category::Monthly), now());
        let first = advance_generation(&m.handle(FeedEvent::ArrivedAtGoal, now()).requests);

        let again = m.handle(label(Category::Monthly), now());
        assert_eq!(again.requests, vec![]);
        assert_eq!(m.phase(), Phase::Settling(Category::Monthly));

        assert_eq!(
            m.on_timer(Timer::AdvanceCategory { generation: first }),
            vec![Request::InteractWith(EntityId(42))]
        );
        // Fired twice: the phase moved on.
        assert_eq!(m.on_timer(Timer::AdvanceCategory { generation: first }), vec![]);
    }

    #[test]
    fn timers_from_before_a_reconnect_are_ignored() {
        let mut m = machine();
        m.handle(label(Category::Lifetime), now());
        let stale = advance_generation(&m.handle(FeedEvent::ArrivedAtGoal, now()).requests);
        m.handle(FeedEvent::Connected, now());
        m.handle(label(Category::Lifetime), now());
        m.handle(FeedEvent::ArrivedAtGoal, now());

        assert_eq!(m.on_timer(Timer::AdvanceCategory { generation: stale }), vec![]);
        assert_eq!(m.phase(), Phase::Settling(Category::Lifetime));
    }

    #[test]
    fn unknown_labels_change_nothing() {
        let mut m = machine();
        m.handle(line("#1 PlayerA (5 Hours)"), now());
        let step = m.handle(
            FeedEvent::LabelObserved {
                text: "§r§f[Daily]".to_string(),
                source: source(),
            },
            now(),
        );

        assert_eq!(step, Step::default());
        assert_eq!(m.buffer().len(), 1);
    }

    #[test]
    fn disconnect_resets_to_awaiting_label() {
        let mut m = machine();
        m.handle(label(Category::Lifetime), now());
        let generation = advance_generation(&m.handle(FeedEvent::ArrivedAtGoal, now()).requests);
        m.handle(line("#1 PlayerA (5 Hours)"), now());

        m.handle(
            FeedEvent::Disconnected {
                reason: "kicked".to_string(),
            },
            now(),
        );

        assert_eq!(m.phase(), Phase::AwaitingLabel);
        assert!(!m.has_arrived());
        assert!(m.buffer().is_empty());
        assert_eq!(m.on_timer(Timer::AdvanceCategory { generation }), vec![]);
    }

    #[test]
    fn refresh_walks_back_only_when_away_from_the_board() {
        let mut m = machine();
        assert_eq!(m.refresh(Category::Weekly), vec![]);

        m.handle(label(Category::Weekly), now());
        assert_eq!(
            m.refresh(Category::Weekly),
            vec![Request::MoveTo(source().position)]
        );

        m.handle(FeedEvent::ArrivedAtGoal, now());
        assert_eq!(m.refresh(Category::Weekly), vec![]);
    }
}

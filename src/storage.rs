use crate::core::{category::Category, record::PlayerRecord};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use strum::IntoEnumIterator;
use tracing::info;

/// Committed entries of one category.
#[derive(Debug, Default, Clone)]
pub struct Dataset {
    // `None` is "never committed" (or aged out by the sweeper).
    pub last_commit_at: Option<DateTime<Utc>>,
    pub records: Vec<PlayerRecord>,
    // Bumped on every commit, lets late writers detect they raced one.
    pub generation: u64,
}

impl Dataset {
    pub fn is_stale(&self, now: DateTime<Utc>, fresh_window: Duration) -> bool {
        match self.last_commit_at {
            None => true,
            Some(at) => now - at > fresh_window,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.last_commit_at.map(|at| now - at)
    }
}

/// The three category datasets, each replaced wholesale on commit.
#[derive(Debug)]
pub struct DatasetStore {
    data: HashMap<Category, Dataset>,
}

impl DatasetStore {
    pub fn new() -> DatasetStore {
        DatasetStore {
            data: Category::iter().map(|c| (c, Dataset::default())).collect(),
        }
    }

    pub fn get(&self, category: Category) -> &Dataset {
        // Every category is inserted at construction.
        &self.data[&category]
    }

    pub fn commit(&mut self, category: Category, records: Vec<PlayerRecord>, now: DateTime<Utc>) {
        let dataset = self.data.entry(category).or_default();
        dataset.records = records;
        dataset.last_commit_at = Some(now);
        dataset.generation += 1;
    }

    pub fn is_stale(&self, category: Category, now: DateTime<Utc>, fresh_window: Duration) -> bool {
        self.get(category).is_stale(now, fresh_window)
    }

    /// Marks datasets older than `max_age` as never committed, keeping their records.
    pub fn sweep(&mut self, now: DateTime<Utc>, max_age: Duration) -> Vec<Category> {
        let mut aged_out = Vec::new();
        for category in Category::iter() {
            let dataset = self.data.entry(category).or_default();
            if let Some(at) = dataset.last_commit_at {
                if now - at > max_age {
                    info!("Data for {} is stale. Marking for refresh.", category);
                    dataset.last_commit_at = None;
                    aged_out.push(category);
                }
            }
        }
        aged_out
    }
}

impl Default for DatasetStore {
    fn default() -> Self {
        DatasetStore::new()
    }
}

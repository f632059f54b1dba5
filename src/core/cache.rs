use crate::core::{
    category::Category,
    query::{OutputKind, SortBy},
};
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use strum::EnumString;
use tracing::debug;

/// Everything that shapes a cached value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Leaderboard {
        category: Category,
        output: OutputKind,
        limit: u32,
        page: u32,
        sort_by: SortBy,
        guild: Option<String>,
    },
    Guilds(Category),
    Search { category: Category, term: String },
    Docs,
}

impl CacheKey {
    pub fn category(&self) -> Option<Category> {
        match self {
            CacheKey::Leaderboard { category, .. }
            | CacheKey::Guilds(category)
            | CacheKey::Search { category, .. } => Some(*category),
            CacheKey::Docs => None,
        }
    }

    pub fn references(&self, category: Category) -> bool {
        self.category() == Some(category)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CacheKey::Leaderboard {
                category,
                output,
                limit,
                page,
                sort_by,
                guild,
            } => write!(
                f,
                "leaderboard_{}_{}_{}_{}_{}_{}",
                category,
                output,
                limit,
                page,
                sort_by,
                guild.as_deref().unwrap_or("all")
            ),
            CacheKey::Guilds(category) => write!(f, "guilds_{}", category),
            CacheKey::Search { category, term } => write!(f, "search_{}_{}", category, term),
            CacheKey::Docs => write!(f, "api_docs"),
        }
    }
}

/// Subsets an administrator can clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ClearTarget {
    #[default]
    All,
    // Structured and image leaderboard responses.
    Leaderboard,
    Guilds,
    Images,
}

impl ClearTarget {
    pub fn matches(&self, key: &CacheKey) -> bool {
        match (self, key) {
            (ClearTarget::All, _) => true,
            (ClearTarget::Leaderboard, CacheKey::Leaderboard { .. }) => true,
            (ClearTarget::Guilds, CacheKey::Guilds(_)) => true,
            (
                ClearTarget::Images,
                CacheKey::Leaderboard {
                    output: OutputKind::Image,
                    ..
                },
            ) => true,
            _ => false,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            ClearTarget::All => "All cache cleared",
            ClearTarget::Leaderboard => "Leaderboard cache cleared",
            ClearTarget::Guilds => "Guilds cache cleared",
            ClearTarget::Images => "Image cache cleared",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Json(serde_json::Value),
    Image(Bytes),
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: CachedValue,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub keys: usize,
    pub hits: u64,
    pub misses: u64,
    // Percent, absent until the first lookup.
    pub hit_rate: Option<u64>,
}

/// Short-lived memo of computed responses. Only the cache itself adds or removes entries.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: HashMap<CacheKey, CacheEntry>,
    hits: u64,
    misses: u64,
}

impl ResponseCache {
    pub fn new() -> Self {
        ResponseCache::default()
    }

    pub fn get(&mut self, key: &CacheKey, now: DateTime<Utc>) -> Option<CachedValue> {
        let expired = self.entries.get(key).map(|entry| entry.expires_at <= now);
        let live = match expired {
            Some(false) => self.entries.get(key).map(|entry| entry.value.clone()),
            Some(true) => {
                self.entries.remove(key);
                None
            }
            None => None,
        };
        match live {
            Some(_) => self.hits += 1,
            None => self.misses += 1,
        }
        live
    }

    pub fn set(&mut self, key: CacheKey, value: CachedValue, ttl: Duration, now: DateTime<Utc>) {
        debug!("Caching {} for {}s", key, ttl.num_seconds());
        self.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Drops every entry whose key satisfies `predicate`, returns how many went.
    pub fn invalidate<P>(&mut self, predicate: P) -> usize
    where
        P: Fn(&CacheKey) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|key, _| !predicate(key));
        before - self.entries.len()
    }

    pub fn invalidate_category(&mut self, category: Category) -> usize {
        self.invalidate(|key| key.references(category))
    }

    pub fn clear(&mut self, target: ClearTarget) -> usize {
        self.invalidate(|key| target.matches(key))
    }

    pub fn flush_all(&mut self) -> usize {
        self.clear(ClearTarget::All)
    }

    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let lookups = self.hits + self.misses;
        CacheStats {
            keys: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
            hit_rate: match lookups {
                0 => None,
                n => Some(((self.hits as f64 / n as f64) * 100.0).round() as u64),
            },
        }
    }
}

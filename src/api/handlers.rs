use crate::api::models::{
    ApiReply, BotHealth, CacheClearRequest, DatasetHealth, GuildFilter, GuildsData,
    HealthReport, LeaderboardData, LeaderboardOutcome, LeaderboardRequest, Pagination, RenderJob,
    SearchData,
};
use crate::board::Board;
use crate::core::{
    cache::{CacheKey, CachedValue},
    category::Category,
    query::{guild_summaries, query, search, search_term, OutputKind},
};
use crate::error::{BoardError, BoardResult};
use crate::utils::format_age;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use strum::IntoEnumIterator;
use tracing::{debug, error, info, warn};

fn from_cache(value: CachedValue) -> ApiReply {
    match value {
        CachedValue::Json(data) => ApiReply::Json { cached: true, data },
        CachedValue::Image(bytes) => ApiReply::Image {
            cached: true,
            bytes,
        },
    }
}

impl Board {
    /// NotFound, with a refresh requested, while `category` has never been populated.
    fn populated(&mut self, category: Category) -> BoardResult<()> {
        match self.store().get(category).records.is_empty() {
            true => {
                warn!("No data for {} yet, triggering refresh.", category);
                self.trigger_refresh(category);
                Err(BoardError::NotFound(category))
            }
            false => Ok(()),
        }
    }

    fn cache_json(&mut self, key: CacheKey, data: &Value, ttl: chrono::Duration, now: DateTime<Utc>) {
        self.cache
            .set(key, CachedValue::Json(data.clone()), ttl, now);
    }

    pub fn leaderboard(
        &mut self,
        request: &LeaderboardRequest,
        now: DateTime<Utc>,
    ) -> BoardResult<LeaderboardOutcome> {
        let key = request.cache_key();
        if let Some(value) = self.cache.get(&key, now) {
            debug!("Cache hit for {}", key);
            return Ok(LeaderboardOutcome::Ready(from_cache(value)));
        }

        let category = request.category;
        self.populated(category)?;

        let is_stale = self.is_stale(category, now);
        if is_stale {
            info!("Stale data for {}, triggering refresh.", category);
            self.trigger_refresh(category);
        }

        let dataset = self.store().get(category);
        let page = query(&dataset.records, &request.params);
        let last_updated = dataset.last_commit_at;
        let generation = dataset.generation;

        match request.output {
            OutputKind::Image => Ok(LeaderboardOutcome::Render(RenderJob {
                key,
                category,
                guild: request.params.guild.clone(),
                as_of: last_updated.unwrap_or(now),
                records: page.items,
                generation,
            })),
            OutputKind::Json => {
                let data = serde_json::to_value(LeaderboardData {
                    duration: category,
                    last_updated,
                    is_stale,
                    pagination: Pagination {
                        page: request.params.page,
                        limit: request.params.limit,
                        total_items: page.total_items,
                        total_pages: page.total_pages,
                    },
                    filter: request
                        .params
                        .guild
                        .clone()
                        .map(|guild| GuildFilter { guild }),
                    sort_by: request.params.sort_by,
                    players: page.items,
                })?;
                let ttl = self.config.ttl.leaderboard;
                self.cache_json(key, &data, ttl, now);
                Ok(LeaderboardOutcome::Ready(ApiReply::Json {
                    cached: false,
                    data,
                }))
            }
        }
    }

    /// Settles an image render. The image is cached only when no commit landed
    /// on its category since the job was created.
    pub fn finish_render(
        &mut self,
        job: RenderJob,
        rendered: BoardResult<Bytes>,
        now: DateTime<Utc>,
    ) -> BoardResult<ApiReply> {
        let bytes = rendered.map_err(|e| {
            error!("Failed to render {}: {}", job.key, e);
            BoardError::Render(e.to_string())
        })?;

        match self.store().get(job.category).generation == job.generation {
            true => {
                let ttl = self.config.ttl.image;
                self.cache
                    .set(job.key, CachedValue::Image(bytes.clone()), ttl, now);
            }
            false => debug!("{} changed while rendering, not caching image.", job.category),
        }

        Ok(ApiReply::Image {
            cached: false,
            bytes,
        })
    }

    pub fn guilds(&mut self, category: Category, now: DateTime<Utc>) -> BoardResult<ApiReply> {
        let key = CacheKey::Guilds(category);
        if let Some(value) = self.cache.get(&key, now) {
            return Ok(from_cache(value));
        }
        self.populated(category)?;

        let dataset = self.store().get(category);
        let guilds = guild_summaries(&dataset.records);
        let data = serde_json::to_value(GuildsData {
            duration: category,
            last_updated: dataset.last_commit_at,
            total_guilds: guilds.len(),
            guilds,
        })?;

        let ttl = self.config.ttl.guilds;
        self.cache_json(key, &data, ttl, now);
        Ok(ApiReply::Json {
            cached: false,
            data,
        })
    }

    pub fn search(
        &mut self,
        raw_term: Option<&str>,
        category: Category,
        now: DateTime<Utc>,
    ) -> BoardResult<ApiReply> {
        let term = search_term(raw_term.unwrap_or_default())?;
        let key = CacheKey::Search {
            category,
            term: term.clone(),
        };
        if let Some(value) = self.cache.get(&key, now) {
            return Ok(from_cache(value));
        }
        self.populated(category)?;

        let results = search(&self.store().get(category).records, &term);
        let data = serde_json::to_value(SearchData {
            query: term,
            duration: category,
            total_results: results.len(),
            results,
        })?;

        let ttl = self.config.ttl.search;
        self.cache_json(key, &data, ttl, now);
        Ok(ApiReply::Json {
            cached: false,
            data,
        })
    }

    pub fn health(&self, now: DateTime<Utc>) -> HealthReport {
        let data = Category::iter()
            .map(|category| {
                let dataset = self.store().get(category);
                let health = DatasetHealth {
                    last_update: dataset.last_commit_at,
                    age: dataset
                        .age(now)
                        .map_or("never updated".to_string(), format_age),
                    fresh: !self.is_stale(category, now),
                    player_count: dataset.records.len(),
                };
                (category, health)
            })
            .collect();

        HealthReport {
            status: "ok",
            timestamp: now,
            uptime_seconds: (now - self.started_at).num_seconds(),
            bot: BotHealth {
                status: self.supervisor.status(),
                reconnect_attempts: self.supervisor.attempts(),
                phase: self.machine.phase(),
            },
            cache: self.cache.stats(),
            data,
        }
    }

    pub fn docs(&mut self, now: DateTime<Utc>) -> ApiReply {
        let key = CacheKey::Docs;
        if let Some(value) = self.cache.get(&key, now) {
            return from_cache(value);
        }

        let data = json!({
            "name": "Playtime Leaderboard API",
            "endpoints": {
                "GET /api/mc/top": {
                    "description": "Leaderboard of one category",
                    "parameters": {
                        "duration": "LIFETIME | MONTHLY | WEEKLY (default MONTHLY)",
                        "responseType": "json | image (default json)",
                        "guild": "case-insensitive guild filter",
                        "sortBy": "rank | username | time (default rank)",
                        "page": "page number, from 1",
                        "limit": "page size, 1 to 100 (default 10)",
                    },
                },
                "GET /api/mc/guilds": {
                    "description": "Guilds of one category with member counts and hours",
                    "parameters": { "duration": "LIFETIME | MONTHLY | WEEKLY" },
                },
                "GET /api/mc/search": {
                    "description": "Players whose name or guild contains the query",
                    "parameters": {
                        "q": "at least 2 characters",
                        "duration": "LIFETIME | MONTHLY | WEEKLY",
                    },
                },
                "GET /api/health": { "description": "Feed, cache and dataset health" },
                "POST /api/cache/clear": {
                    "description": "Clears cached responses",
                    "parameters": {
                        "key": "admin API key",
                        "type": "all | leaderboard | guilds | images (default all)",
                    },
                },
            },
        });

        let ttl = self.config.ttl.docs;
        self.cache_json(key, &data, ttl, now);
        ApiReply::Json {
            cached: false,
            data,
        }
    }

    pub fn clear_cache(&mut self, request: &CacheClearRequest) -> BoardResult<ApiReply> {
        let authorized = match (&self.config.admin_api_key, &request.key) {
            (Some(expected), Some(given)) => expected == given,
            _ => false,
        };
        if !authorized {
            warn!("Rejected cache clear with an invalid API key.");
            return Err(BoardError::Unauthorized);
        }

        let target = request.target()?;
        let removed = self.cache.clear(target);
        info!("{} ({} entries).", target.describe(), removed);
        Ok(ApiReply::Message(target.describe().to_string()))
    }
}

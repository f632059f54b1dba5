//! Request and reply types of the query surface. An HTTP gateway in front of
//! [`EngineHandle`](crate::engine::EngineHandle) maps replies with `content_type`,
//! `envelope` and `error_body`; nothing inside the crate serves HTTP itself.

use crate::core::{
    cache::{CacheKey, CacheStats, ClearTarget},
    category::Category,
    machine::Phase,
    query::{GuildSummary, OutputKind, ProcessedRecord, QueryParams, SearchHit, SortBy},
    supervisor::ConnectionStatus,
};
use crate::error::{BoardError, BoardResult};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::str::FromStr;

fn parse_enum<T: FromStr + Default>(raw: Option<&str>, field: &str) -> BoardResult<T> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(T::default()),
        Some(value) => T::from_str(value)
            .map_err(|_| BoardError::Validation(format!("Invalid {}: {}", field, value))),
    }
}

fn parse_number(raw: Option<&str>, field: &str, default: u32) -> BoardResult<u32> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(value) => value
            .parse::<u32>()
            .map_err(|_| BoardError::Validation(format!("Invalid {}: {}", field, value))),
    }
}

/// Query string of a leaderboard request, as received.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardQuery {
    #[serde(alias = "duration")]
    pub category: Option<String>,
    #[serde(alias = "responseType")]
    pub output: Option<String>,
    pub guild: Option<String>,
    pub sort_by: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardRequest {
    pub category: Category,
    pub output: OutputKind,
    pub params: QueryParams,
}

impl LeaderboardRequest {
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::Leaderboard {
            category: self.category,
            output: self.output,
            limit: self.params.limit,
            page: self.params.page,
            sort_by: self.params.sort_by,
            guild: self.params.guild.clone(),
        }
    }
}

impl TryFrom<LeaderboardQuery> for LeaderboardRequest {
    type Error = BoardError;

    fn try_from(query: LeaderboardQuery) -> BoardResult<Self> {
        let category = parse_enum(query.category.as_deref(), "duration")?;
        let output = parse_enum(query.output.as_deref(), "response type")?;
        let sort_by = parse_enum(query.sort_by.as_deref(), "sortBy")?;
        let page = parse_number(query.page.as_deref(), "page", 1)?;
        let limit = parse_number(query.limit.as_deref(), "limit", 10)?;
        let guild = query.guild.map(|g| g.trim().to_string());

        Ok(LeaderboardRequest {
            category,
            output,
            params: QueryParams::new(guild, sort_by, page, limit)?,
        })
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CategoryQuery {
    #[serde(alias = "duration")]
    pub category: Option<String>,
}

impl CategoryQuery {
    pub fn category(&self) -> BoardResult<Category> {
        parse_enum(self.category.as_deref(), "duration")
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct SearchQuery {
    #[serde(alias = "query")]
    pub q: Option<String>,
    #[serde(alias = "duration")]
    pub category: Option<String>,
}

impl SearchQuery {
    pub fn category(&self) -> BoardResult<Category> {
        parse_enum(self.category.as_deref(), "duration")
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CacheClearRequest {
    pub key: Option<String>,
    #[serde(alias = "type")]
    pub target: Option<String>,
}

impl CacheClearRequest {
    pub fn target(&self) -> BoardResult<ClearTarget> {
        parse_enum(self.target.as_deref(), "cache type")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total_items: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuildFilter {
    pub guild: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardData {
    pub duration: Category,
    pub last_updated: Option<DateTime<Utc>>,
    pub is_stale: bool,
    pub pagination: Pagination,
    pub filter: Option<GuildFilter>,
    pub sort_by: SortBy,
    pub players: Vec<ProcessedRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildsData {
    pub duration: Category,
    pub last_updated: Option<DateTime<Utc>>,
    pub total_guilds: usize,
    pub guilds: Vec<GuildSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchData {
    pub query: String,
    pub duration: Category,
    pub total_results: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotHealth {
    pub status: ConnectionStatus,
    pub reconnect_attempts: u32,
    pub phase: Phase,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetHealth {
    pub last_update: Option<DateTime<Utc>>,
    pub age: String,
    pub fresh: bool,
    pub player_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: i64,
    pub bot: BotHealth,
    pub cache: CacheStats,
    pub data: BTreeMap<Category, DatasetHealth>,
}

/// Everything needed to render an image off the engine turn.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub key: CacheKey,
    pub category: Category,
    pub guild: Option<String>,
    pub as_of: DateTime<Utc>,
    pub records: Vec<ProcessedRecord>,
    // Dataset generation the records were read from.
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiReply {
    Json { cached: bool, data: Value },
    Image { cached: bool, bytes: Bytes },
    Message(String),
}

impl ApiReply {
    pub fn is_cached(&self) -> bool {
        match self {
            ApiReply::Json { cached, .. } | ApiReply::Image { cached, .. } => *cached,
            ApiReply::Message(_) => false,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            // Rendered cards are text.
            ApiReply::Image { .. } => "text/plain; charset=utf-8",
            _ => "application/json",
        }
    }

    /// JSON envelope sent to clients. Images travel as raw bytes instead.
    pub fn envelope(&self) -> Option<Value> {
        match self {
            ApiReply::Json { cached, data } => Some(json!({
                "success": true,
                "cached": cached,
                "data": data,
            })),
            ApiReply::Message(message) => Some(json!({
                "success": true,
                "message": message,
            })),
            ApiReply::Image { .. } => None,
        }
    }
}

#[derive(Debug)]
pub enum LeaderboardOutcome {
    Ready(ApiReply),
    Render(RenderJob),
}

pub fn error_body(error: &BoardError) -> Value {
    match error {
        BoardError::NotFound(category) => json!({
            "success": false,
            "error": error.to_string(),
            "duration": category,
            "refreshTriggered": true,
        }),
        _ => json!({
            "success": false,
            "error": error.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> LeaderboardQuery {
        let object = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect::<serde_json::Map<String, Value>>();
        serde_json::from_value(Value::Object(object)).unwrap()
    }

    #[test]
    fn defaults_apply_to_an_empty_query() {
        let request = LeaderboardRequest::try_from(LeaderboardQuery::default()).unwrap();
        assert_eq!(request.category, Category::Monthly);
        assert_eq!(request.output, OutputKind::Json);
        assert_eq!(request.params, QueryParams::default());
        assert_eq!(
            request.cache_key().to_string(),
            "leaderboard_MONTHLY_json_10_1_rank_all"
        );
    }

    #[test]
    fn accepts_legacy_parameter_names() {
        let request = LeaderboardRequest::try_from(query(&[
            ("duration", "weekly"),
            ("responseType", "image"),
            ("sortBy", "top"),
            ("page", "2"),
            ("guild", " Crew "),
        ]))
        .unwrap();

        assert_eq!(request.category, Category::Weekly);
        assert_eq!(request.output, OutputKind::Image);
        assert_eq!(request.params.sort_by, SortBy::Rank);
        assert_eq!(request.params.page, 2);
        assert_eq!(request.params.guild.as_deref(), Some("Crew"));
    }

    #[test]
    fn invalid_values_are_validation_errors() {
        for pairs in [
            vec![("duration", "daily")],
            vec![("responseType", "pdf")],
            vec![("sortBy", "score")],
            vec![("page", "0")],
            vec![("page", "-1")],
            vec![("limit", "101")],
            vec![("limit", "ten")],
        ] {
            let error = LeaderboardRequest::try_from(query(&pairs)).unwrap_err();
            assert!(matches!(error, BoardError::Validation(_)), "{:?}", pairs);
        }
    }

    #[test]
    fn envelopes() {
        let reply = ApiReply::Json {
            cached: true,
            data: json!({"a": 1}),
        };
        assert_eq!(
            reply.envelope().unwrap(),
            json!({"success": true, "cached": true, "data": {"a": 1}})
        );
        let image = ApiReply::Image {
            cached: false,
            bytes: Bytes::from_static(b"png"),
        };
        assert!(image.envelope().is_none());
        assert_eq!(image.content_type(), "text/plain; charset=utf-8");

        let body = error_body(&BoardError::NotFound(Category::Weekly));
        assert_eq!(body["duration"], "WEEKLY");
        assert_eq!(body["refreshTriggered"], true);
    }

    #[test]
    fn clear_target_defaults_to_all() {
        let request = CacheClearRequest::default();
        assert_eq!(request.target().unwrap(), ClearTarget::All);
        let bad = CacheClearRequest {
            key: None,
            target: Some("search".to_string()),
        };
        assert!(bad.target().is_err());
    }
}

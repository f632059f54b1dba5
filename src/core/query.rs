use crate::core::record::{PlayerRecord, TimeUnit};
use crate::error::{BoardError, BoardResult};
use crate::utils::strip_color_codes;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use std::cmp::Reverse;
use strum::{Display, EnumString};

pub const MAX_LIMIT: u32 = 100;
pub const MIN_SEARCH_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    // "top" is what older clients send.
    #[default]
    #[strum(to_string = "rank", serialize = "top")]
    Rank,
    Username,
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    #[default]
    #[strum(to_string = "json", serialize = "structured")]
    Json,
    #[strum(to_string = "image")]
    Image,
}

/// Validated filter/sort/pagination parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryParams {
    pub guild: Option<String>,
    pub sort_by: SortBy,
    pub page: u32,
    pub limit: u32,
}

impl QueryParams {
    pub fn new(guild: Option<String>, sort_by: SortBy, page: u32, limit: u32) -> BoardResult<Self> {
        if page < 1 {
            return Err(BoardError::Validation(
                "Invalid page. Must be 1 or greater".to_string(),
            ));
        }
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(BoardError::Validation(format!(
                "Invalid limit. Must be between 1 and {}",
                MAX_LIMIT
            )));
        }
        Ok(QueryParams {
            guild: guild.filter(|g| !g.is_empty()),
            sort_by,
            page,
            limit,
        })
    }
}

impl Default for QueryParams {
    fn default() -> Self {
        QueryParams {
            guild: None,
            sort_by: SortBy::Rank,
            page: 1,
            limit: 10,
        }
    }
}

/// A record with its display fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedRecord {
    #[serde(flatten)]
    pub record: PlayerRecord,
    pub clean_username: String,
    pub hours_played: u64,
}

impl From<&PlayerRecord> for ProcessedRecord {
    fn from(record: &PlayerRecord) -> Self {
        ProcessedRecord {
            clean_username: strip_color_codes(&record.raw_username),
            hours_played: record.hours(),
            record: record.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPage {
    pub items: Vec<ProcessedRecord>,
    pub total_items: usize,
    pub total_pages: usize,
}

/// Filter, then stable sort, then paginate. Pages past the end are empty.
pub fn query(records: &[PlayerRecord], params: &QueryParams) -> QueryPage {
    let mut selected = match &params.guild {
        Some(guild) => {
            let needle = guild.to_lowercase();
            records
                .iter()
                .filter(|r| {
                    r.guild_tag
                        .as_ref()
                        .map_or(false, |tag| tag.to_lowercase().contains(&needle))
                })
                .collect::<Vec<&PlayerRecord>>()
        }
        None => records.iter().collect::<Vec<&PlayerRecord>>(),
    };

    // `sort_by` is stable, so ties keep their board order.
    match params.sort_by {
        SortBy::Rank => selected.sort_by_key(|r| r.rank),
        SortBy::Username => selected.sort_by(|a, b| a.raw_username.cmp(&b.raw_username)),
        SortBy::Time => selected.sort_by_key(|r| Reverse(r.hours())),
    }

    // Hand-built params may carry zeros.
    let limit = (params.limit as usize).max(1);
    let total_items = selected.len();
    let total_pages = total_items.div_ceil(limit);
    let start = (params.page as usize)
        .saturating_sub(1)
        .saturating_mul(limit);

    let items = selected
        .into_iter()
        .skip(start)
        .take(limit)
        .map(ProcessedRecord::from)
        .collect();

    QueryPage {
        items,
        total_items,
        total_pages,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildMember {
    pub username: String,
    pub rank: u32,
    pub hours: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildSummary {
    pub name: String,
    pub member_count: usize,
    pub total_hours: u64,
    pub average_hours: u64,
    pub members: Vec<GuildMember>,
}

/// Guild => members, by member count, then name.
pub fn guild_summaries(records: &[PlayerRecord]) -> Vec<GuildSummary> {
    records
        .iter()
        .filter_map(|r| r.guild_tag.as_ref().map(|tag| (strip_color_codes(tag), r)))
        .into_group_map()
        .into_iter()
        .map(|(name, members)| {
            let total_hours = members.iter().map(|r| r.hours()).sum::<u64>();
            let member_count = members.len();
            GuildSummary {
                name,
                member_count,
                total_hours,
                // Rounded to the nearest hour.
                average_hours: (total_hours as f64 / member_count as f64).round() as u64,
                members: members
                    .into_iter()
                    .map(|r| GuildMember {
                        username: strip_color_codes(&r.raw_username),
                        rank: r.rank,
                        hours: r.hours(),
                    })
                    .collect(),
            }
        })
        .sorted_by(|a, b| {
            b.member_count
                .cmp(&a.member_count)
                .then_with(|| a.name.cmp(&b.name))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub username: String,
    pub clean_username: String,
    pub rank: u32,
    pub hours: u64,
    pub time_unit: TimeUnit,
    pub guild: Option<String>,
    pub observed_at: DateTime<Utc>,
}

/// Lowercased search term, at least two characters long.
pub fn search_term(raw: &str) -> BoardResult<String> {
    let term = raw.trim().to_lowercase();
    match term.chars().count() >= MIN_SEARCH_LEN {
        true => Ok(term),
        false => Err(BoardError::Validation(format!(
            "Search query must be at least {} characters",
            MIN_SEARCH_LEN
        ))),
    }
}

/// Records whose display username or guild contains `term` (already lowercased).
pub fn search(records: &[PlayerRecord], term: &str) -> Vec<SearchHit> {
    records
        .iter()
        .filter(|r| {
            strip_color_codes(&r.raw_username)
                .to_lowercase()
                .contains(term)
                || r.guild_tag
                    .as_ref()
                    .map_or(false, |g| strip_color_codes(g).to_lowercase().contains(term))
        })
        .map(|r| SearchHit {
            username: r.raw_username.clone(),
            clean_username: strip_color_codes(&r.raw_username),
            rank: r.rank,
            hours: r.hours(),
            time_unit: r.unit,
            guild: r.guild_tag.clone(),
            observed_at: r.observed_at,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn record(line: &str) -> PlayerRecord {
        PlayerRecord::from_line(line, at()).unwrap()
    }

    fn board(n: u32) -> Vec<PlayerRecord> {
        (1..=n)
            .map(|rank| record(&format!("#{rank} §7Player{rank} §b[Crew] (1 Hours)")))
            .collect()
    }

    fn params(sort_by: SortBy, page: u32, limit: u32) -> QueryParams {
        QueryParams::new(None, sort_by, page, limit).unwrap()
    }

    #[test]
    fn second_page_holds_indices_ten_to_nineteen() {
        let records = board(25);
        let page = query(&records, &params(SortBy::Rank, 2, 10));

        assert_eq!(page.total_items, 25);
        assert_eq!(page.total_pages, 3);
        let ranks = page.items.iter().map(|p| p.record.rank).collect::<Vec<_>>();
        assert_eq!(ranks, (11..=20).collect::<Vec<u32>>());
    }

    #[test]
    fn pages_past_the_end_are_empty() {
        let page = query(&board(5), &params(SortBy::Rank, 4, 10));
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 1);

        let empty = query(&[], &params(SortBy::Rank, 1, 10));
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn hand_built_params_are_clamped() {
        let zeroes = QueryParams {
            guild: None,
            sort_by: SortBy::Rank,
            page: 0,
            limit: 0,
        };
        let page = query(&board(3), &zeroes);

        assert_eq!(page.total_items, 3);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].record.rank, 1);
    }

    #[test]
    fn time_sort_normalizes_days() {
        let records = vec![record("#1 Hours20 (20 Hours)"), record("#2 OneDay (1 Days)")];
        let page = query(&records, &params(SortBy::Time, 1, 10));
        assert_eq!(page.items[0].clean_username, "OneDay");
        assert_eq!(page.items[0].hours_played, 24);
    }

    #[test]
    fn sorts_are_stable() {
        let records = vec![
            record("#1 Zed (2 Hours)"),
            record("#2 Amy (2 Hours)"),
            record("#3 Bob (5 Hours)"),
        ];
        let by_time = query(&records, &params(SortBy::Time, 1, 10));
        let names = by_time
            .items
            .iter()
            .map(|p| p.clean_username.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Bob", "Zed", "Amy"]);

        let by_name = query(&records, &params(SortBy::Username, 1, 10));
        assert_eq!(by_name.items[0].clean_username, "Amy");
    }

    #[test]
    fn guild_filter_is_case_insensitive_substring() {
        let records = vec![
            record("#1 A §b[CrewMates] (2 Hours)"),
            record("#2 B (2 Hours)"),
            record("#3 C §c[Other] (2 Hours)"),
        ];
        let params = QueryParams::new(Some("crew".to_string()), SortBy::Rank, 1, 10).unwrap();
        let page = query(&records, &params);
        assert_eq!(page.total_items, 1);
        assert_eq!(page.items[0].record.rank, 1);
    }

    #[test]
    fn rejects_out_of_range_parameters() {
        assert!(QueryParams::new(None, SortBy::Rank, 0, 10).is_err());
        assert!(QueryParams::new(None, SortBy::Rank, 1, 0).is_err());
        assert!(QueryParams::new(None, SortBy::Rank, 1, 101).is_err());
        assert!(QueryParams::new(None, SortBy::Rank, 1, 100).is_ok());
    }

    #[test]
    fn parses_enum_aliases() {
        assert_eq!(SortBy::from_str("top").unwrap(), SortBy::Rank);
        assert_eq!(SortBy::from_str("TIME").unwrap(), SortBy::Time);
        assert!(SortBy::from_str("score").is_err());
        assert_eq!(OutputKind::from_str("structured").unwrap(), OutputKind::Json);
        assert_eq!(OutputKind::from_str("image").unwrap(), OutputKind::Image);
        assert_eq!(SortBy::Rank.to_string(), "rank");
        assert_eq!(OutputKind::Json.to_string(), "json");
    }

    #[test]
    fn aggregates_guilds_by_member_count() {
        let records = vec![
            record("#1 A §b[Crew] (1 Days)"),
            record("#2 B §c[Solo] (30 Hours)"),
            record("#3 §eC §b[Crew] (3 Hours)"),
            record("#4 D (100 Hours)"),
        ];
        let guilds = guild_summaries(&records);

        assert_eq!(guilds.len(), 2);
        assert_eq!(guilds[0].name, "[Crew]");
        assert_eq!(guilds[0].member_count, 2);
        assert_eq!(guilds[0].total_hours, 27);
        assert_eq!(guilds[0].average_hours, 14);
        assert_eq!(guilds[0].members[1].username, "C");
        assert_eq!(guilds[1].name, "[Solo]");
    }

    #[test]
    fn search_matches_clean_names_and_guilds() {
        let records = vec![
            record("#1 §aSte§bve (1 Hours)"),
            record("#2 Alex §b[Steel] (1 Hours)"),
            record("#3 Notch (1 Hours)"),
        ];
        let term = search_term("  STE ").unwrap();
        let hits = search(&records, &term);

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].clean_username, "Steve");
        assert_eq!(hits[1].guild.as_deref(), Some("§b[Steel]"));
        assert!(search_term("s").is_err());
    }
}

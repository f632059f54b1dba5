use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

// One board line, e.g. "§r§e#3 §7Steve §b[Crew] §e(12 Days)":
//   optional reset/color markers, "#<rank>", a username made of marker-prefixed runs,
//   an optional "<markers>[<guild>]" segment, and a trailing "(<n> Hours|Days)".
static REGEX_BOARD_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:§r)?(?:§[0-9a-fk-or])*#(?P<rank>\d+)\s+(?P<username>(?:§[0-9a-fk-or])*[A-Za-z0-9_]+(?:(?:§[0-9a-fk-or])+[A-Za-z0-9_]+)*)\s+(?:(?P<guild_color>(?:§[0-9a-fk-or])*)\[(?P<guild>[^\]]+)\]\s+)?(?:§[0-9a-fk-or])*\((?P<magnitude>\d+)\s(?P<unit>Hours|Days)\)\s*$",
    )
    .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TimeUnit {
    Hours,
    Days,
}

impl TimeUnit {
    fn from_label(unit: &str) -> Option<Self> {
        match unit {
            "Hours" => Some(TimeUnit::Hours),
            "Days" => Some(TimeUnit::Days),
            _ => None,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TimeUnit::Hours => write!(f, "Hours"),
            TimeUnit::Days => write!(f, "Days"),
        }
    }
}

/// One ranked entry as read from the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub rank: u32,
    // Keeps the inline color markers; stripping happens at display time.
    pub raw_username: String,
    pub guild_tag: Option<String>,
    pub magnitude: u32,
    pub unit: TimeUnit,
    pub observed_at: DateTime<Utc>,
}

impl PlayerRecord {
    /// Parses a board line. Lines outside the grammar yield `None` and are simply not records.
    pub fn from_line(line: &str, observed_at: DateTime<Utc>) -> Option<Self> {
        let captures = REGEX_BOARD_LINE.captures(line)?;

        let rank = captures["rank"].parse::<u32>().ok().filter(|r| *r >= 1)?;
        let magnitude = captures["magnitude"].parse::<u32>().ok()?;
        let unit = TimeUnit::from_label(&captures["unit"])?;
        let guild_tag = captures.name("guild").map(|name| {
            let color = captures
                .name("guild_color")
                .map_or("", |color| color.as_str());
            format!("{}[{}]", color, name.as_str())
        });

        Some(PlayerRecord {
            rank,
            raw_username: captures["username"].to_string(),
            guild_tag,
            magnitude,
            unit,
            observed_at,
        })
    }

    /// Playtime with days converted to hours.
    pub fn hours(&self) -> u64 {
        match self.unit {
            TimeUnit::Days => u64::from(self.magnitude) * 24,
            TimeUnit::Hours => u64::from(self.magnitude),
        }
    }
}

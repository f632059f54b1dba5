use crate::{core::query::ProcessedRecord, utils::{format_rank, strip_color_codes}};
use itertools::Itertools;

// Display leaderboard rows as a fixed-width table
pub fn board(entries: &[ProcessedRecord], avatars: &[String]) -> String {
    // calculate width for positions, "1st", "22nd", ...
    let width_pos = entries
        .iter()
        .map(|e| format_rank(e.record.rank).len())
        .max()
        .unwrap_or_default();

    // calculate width for names
    let width_name = entries
        .iter()
        .map(|e| e.clean_username.chars().count())
        .max()
        .unwrap_or_default();

    let guilds = entries
        .iter()
        .map(|e| {
            e.record
                .guild_tag
                .as_deref()
                .map_or(String::new(), strip_color_codes)
        })
        .collect::<Vec<String>>();
    let width_guild = guilds.iter().map(|g| g.chars().count()).max().unwrap_or_default();

    // calculate width for playtime, "1234h"
    let width_hours = entries
        .iter()
        .map(|e| e.hours_played.to_string().len() + 1)
        .max()
        .unwrap_or_default();

    entries
        .iter()
        .zip(guilds.iter())
        .enumerate()
        .map(|(idx, (entry, guild))| {
            let row = format!(
                "{:>width_pos$} {:<width_name$} {:<width_guild$} {:>width_hours$}",
                format_rank(entry.record.rank),
                entry.clean_username,
                guild,
                format!("{}h", entry.hours_played),
            );
            let row = match avatars.get(idx) {
                Some(avatar) => format!("{}  {}", row, avatar),
                None => row,
            };
            row.trim_end().to_string()
        })
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::PlayerRecord;
    use chrono::Utc;

    fn processed(line: &str) -> ProcessedRecord {
        ProcessedRecord::from(&PlayerRecord::from_line(line, Utc::now()).unwrap())
    }

    #[test]
    fn aligns_columns() {
        let rows = vec![
            processed("#1 §6Steve §b[Crew] (2 Days)"),
            processed("#12 Al (7 Hours)"),
        ];
        let table = board(&rows, &[]);
        let lines = table.lines().collect::<Vec<_>>();

        assert_eq!(lines[0], " 1st Steve [Crew] 48h");
        assert_eq!(lines[1], "12th Al            7h");
    }

    #[test]
    fn appends_avatar_markers() {
        let rows = vec![processed("#1 Steve (2 Hours)")];
        let table = board(&rows, &["[head]".to_string()]);
        assert_eq!(table, "1st Steve  2h  [head]");
    }
}

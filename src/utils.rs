use chrono::Duration;
use once_cell::sync::Lazy;
use regex::Regex;

// Formatting codes of the in-world text: '§' followed by a color or style code.
static REGEX_COLOR_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"§[0-9a-fk-or]").unwrap());

/// Removes every inline color/style marker, leaving the displayable text.
pub fn strip_color_codes(text: &str) -> String {
    REGEX_COLOR_MARKER.replace_all(text, "").into_owned()
}

pub fn suffix(num: u32) -> &'static str {
    let s = num.to_string();
    if s.ends_with('1') && !s.ends_with("11") {
        "st"
    } else if s.ends_with('2') && !s.ends_with("12") {
        "nd"
    } else if s.ends_with('3') && !s.ends_with("13") {
        "rd"
    } else {
        "th"
    }
}

pub fn format_rank(rank: u32) -> String {
    format!("{}{}", rank, suffix(rank))
}

pub fn format_age(age: Duration) -> String {
    format!("{} seconds", age.num_seconds())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markers_but_keeps_text() {
        assert_eq!(strip_color_codes("§7Steve§a_x"), "Steve_x");
        assert_eq!(strip_color_codes("§r§6[§6§l§nLifetime§6]"), "[Lifetime]");
        assert_eq!(strip_color_codes("plain"), "plain");
        // Not a known code, left alone.
        assert_eq!(strip_color_codes("§zName"), "§zName");
    }

    #[test]
    fn ordinal_suffixes() {
        assert_eq!(format_rank(1), "1st");
        assert_eq!(format_rank(2), "2nd");
        assert_eq!(format_rank(3), "3rd");
        assert_eq!(format_rank(11), "11th");
        assert_eq!(format_rank(12), "12th");
        assert_eq!(format_rank(22), "22nd");
        assert_eq!(format_rank(103), "103rd");
    }
}

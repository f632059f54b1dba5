use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// The three partitions of the in-world playtime board.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Category {
    Lifetime,
    Monthly,
    Weekly,
}

impl Category {
    /// Exact selector text shown above the board while this category is visible.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Lifetime => "§r§6[§6§l§nLifetime§6] §f[Monthly] [Weekly]",
            Category::Monthly => "§r§f[Lifetime] §6[§6§l§nMonthly§6] §f[Weekly]",
            Category::Weekly => "§r§f[Lifetime] [Monthly] §6[§6§l§nWeekly§6]",
        }
    }

    /// Only exact matches count; anything else is not a selector label.
    pub fn from_label(text: &str) -> Option<Category> {
        Category::iter().find(|category| category.label() == text)
    }

    /// Category the board shows after one interaction with the selector.
    pub fn next(&self) -> Category {
        match self {
            Category::Lifetime => Category::Monthly,
            Category::Monthly => Category::Weekly,
            Category::Weekly => Category::Lifetime,
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Monthly
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn labels_map_back_to_their_category() {
        for category in Category::iter() {
            assert_eq!(Category::from_label(category.label()), Some(category));
        }
    }

    #[test]
    fn near_miss_labels_are_rejected() {
        assert_eq!(Category::from_label("[Lifetime] [Monthly] [Weekly]"), None);
        assert_eq!(
            Category::from_label("§r§f[Lifetime] §6[§6§l§nMonthly§6] §f[Weekly] "),
            None
        );
        assert_eq!(Category::from_label(""), None);
    }

    #[test]
    fn rotation_cycles_through_all_three() {
        assert_eq!(Category::Lifetime.next(), Category::Monthly);
        assert_eq!(Category::Monthly.next(), Category::Weekly);
        assert_eq!(Category::Weekly.next(), Category::Lifetime);
    }

    #[test]
    fn parses_case_insensitively_and_displays_uppercase() {
        assert_eq!(Category::from_str("weekly").unwrap(), Category::Weekly);
        assert_eq!(Category::from_str("LifeTime").unwrap(), Category::Lifetime);
        assert!(Category::from_str("daily").is_err());
        assert_eq!(Category::Monthly.to_string(), "MONTHLY");
    }
}

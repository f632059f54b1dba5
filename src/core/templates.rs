use crate::error::BoardResult;
use minijinja::{Environment, Template};
use once_cell::sync::Lazy;
use strum::{EnumIter, IntoEnumIterator};
use tracing::info;

static TEMPLATES_ENVIRONMENT: Lazy<Environment> = Lazy::new(|| {
    info!("Initializing templating engine environment.");
    let mut env = Environment::new();

    // Use strum to iterate over the variants of the enum.
    for template in BoardTemplate::iter() {
        env.add_template(template.name(), template.template())
            .unwrap();
    }

    info!("Templates loaded in templating engine environment.");

    env
});

#[derive(EnumIter)]
pub enum BoardTemplate {
    LeaderboardCard,
    CacheStats,
}

impl BoardTemplate {
    pub fn name(&self) -> &'static str {
        match self {
            BoardTemplate::LeaderboardCard => "leaderboard_card.txt",
            BoardTemplate::CacheStats => "cache_stats.txt",
        }
    }

    pub fn get(&self) -> BoardResult<Template<'_, '_>> {
        Ok(TEMPLATES_ENVIRONMENT.get_template(self.name())?)
    }

    pub fn template(&self) -> &'static str {
        // \n\ at each code line end creates a line break at the proper position and discards further spaces in this line of code.
        // \x20 (hex; 32 in decimal) is an ASCII space and an indicator for the first space to be preserved in this line of the string.
        match self {
            BoardTemplate::LeaderboardCard => {
                "🏆 {{ category }} PLAYTIME LEADERBOARD\n\
                {%- if guild %}\n\
                \x20  guild: {{ guild }}\n\
                {%- endif %}\n\
                \x20  as of {{ as_of }}\n\n\
                {%- if table %}\n\
                {{ table }}\n\
                {%- else %}\n\
                \x20  (no players)\n\
                {%- endif %}\n"
            }
            BoardTemplate::CacheStats => {
                "Cache stats: {{ keys }} keys, {{ hits }} hits, {{ misses }} misses, hit rate: \
                {{ hit_rate ~ '%' if hit_rate is not none else 'N/A' }}"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    #[test]
    fn every_template_compiles() {
        for template in BoardTemplate::iter() {
            assert!(template.get().is_ok(), "{}", template.name());
        }
    }

    #[test]
    fn card_shows_filter_and_table() {
        let card = BoardTemplate::LeaderboardCard
            .get()
            .unwrap()
            .render(context! {
                category => "WEEKLY",
                guild => "Crew",
                as_of => "01/03/2024 12:00:00",
                table => "1st Steve 2h",
            })
            .unwrap();

        assert!(card.starts_with("🏆 WEEKLY PLAYTIME LEADERBOARD"));
        assert!(card.contains("guild: Crew"));
        assert!(card.contains("1st Steve 2h"));
    }

    #[test]
    fn stats_line_handles_missing_rate() {
        let line = BoardTemplate::CacheStats
            .get()
            .unwrap()
            .render(context! { keys => 0, hits => 0, misses => 0, hit_rate => () })
            .unwrap();
        assert_eq!(line, "Cache stats: 0 keys, 0 hits, 0 misses, hit rate: N/A");
    }
}

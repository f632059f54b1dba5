use crate::cli::Cli;
use crate::error::BoardResult;
use chrono::Duration;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::Level;

const TRACE_LEVELS: [&'static str; 5] = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
const LOCAL_SETTINGS_YAML_FILE: &str = ".env.local.yaml";

// All settings may be configured via environment variables. Example:
// ADMIN_API_KEY="xxx" would set admin_api_key to the xxx value.
#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    #[serde(default = "default_trace_level")]
    trace_level: String,
    // Without a key, every cache clear request is refused.
    pub admin_api_key: Option<String>,
    pub feed_capture: Option<PathBuf>,
    #[serde(default = "default_label_settle_delay_sec")]
    pub label_settle_delay_sec: u64,
    #[serde(default = "default_arrival_interact_delay_ms")]
    pub arrival_interact_delay_ms: u64,
    // Entries shown by the in-world board at once.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_fresh_window_sec")]
    pub fresh_window_sec: i64,
    #[serde(default = "default_max_data_age_sec")]
    pub max_data_age_sec: i64,
    #[serde(default = "default_sweep_interval_sec")]
    pub sweep_interval_sec: u64,
    #[serde(default = "default_stats_interval_sec")]
    pub stats_interval_sec: u64,
    #[serde(default = "default_reconnect_base_delay_sec")]
    pub reconnect_base_delay_sec: u64,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_ttl_leaderboard_sec")]
    pub ttl_leaderboard_sec: i64,
    #[serde(default = "default_ttl_image_sec")]
    pub ttl_image_sec: i64,
    #[serde(default = "default_ttl_guilds_sec")]
    pub ttl_guilds_sec: i64,
    #[serde(default = "default_ttl_search_sec")]
    pub ttl_search_sec: i64,
    #[serde(default = "default_ttl_docs_sec")]
    pub ttl_docs_sec: i64,
    #[serde(default = "default_cache_check_period_sec")]
    pub cache_check_period_sec: u64,
    #[serde(default = "default_head_base_url")]
    pub head_base_url: String,
    #[serde(default = "default_head_timeout_sec")]
    pub head_timeout_sec: u64,
}

impl Settings {
    /// YAML file (if any) < environment < command line.
    pub fn load(cli: &Cli) -> BoardResult<Self> {
        let file = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(LOCAL_SETTINGS_YAML_FILE));

        let mut figment = Figment::new();
        if Path::new(&file).exists() {
            println!(
                "\n######################################\n\
                   ##   Found '{}' file,\n\
                   ##   loading local configuration.   ##\n\
                   ######################################\n",
                file.display()
            );
            figment = figment.merge(Yaml::file(&file));
        }

        Settings::from_figment(figment.merge(Env::raw()).merge(Serialized::defaults(cli)))
    }

    pub fn from_figment(figment: Figment) -> BoardResult<Self> {
        Ok(figment.extract()?)
    }

    pub fn get_trace_level(&self) -> Level {
        get_trace_level(&self.trace_level)
    }
}

/// Typed tunables of the board, derived from the settings.
#[derive(Debug, Clone)]
pub struct BoardConfig {
    pub label_settle_delay: std::time::Duration,
    pub arrival_interact_delay: std::time::Duration,
    pub page_size: usize,
    pub fresh_window: Duration,
    pub max_data_age: Duration,
    pub reconnect_base_delay: std::time::Duration,
    pub max_reconnect_attempts: u32,
    pub admin_api_key: Option<String>,
    pub ttl: CacheTtl,
}

#[derive(Debug, Clone)]
pub struct CacheTtl {
    pub leaderboard: Duration,
    pub image: Duration,
    pub guilds: Duration,
    pub search: Duration,
    pub docs: Duration,
}

impl Default for BoardConfig {
    fn default() -> Self {
        BoardConfig {
            label_settle_delay: std::time::Duration::from_secs(default_label_settle_delay_sec()),
            arrival_interact_delay: std::time::Duration::from_millis(
                default_arrival_interact_delay_ms(),
            ),
            page_size: default_page_size(),
            fresh_window: Duration::seconds(default_fresh_window_sec()),
            max_data_age: Duration::seconds(default_max_data_age_sec()),
            reconnect_base_delay: std::time::Duration::from_secs(
                default_reconnect_base_delay_sec(),
            ),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            admin_api_key: None,
            ttl: CacheTtl {
                leaderboard: Duration::seconds(default_ttl_leaderboard_sec()),
                image: Duration::seconds(default_ttl_image_sec()),
                guilds: Duration::seconds(default_ttl_guilds_sec()),
                search: Duration::seconds(default_ttl_search_sec()),
                docs: Duration::seconds(default_ttl_docs_sec()),
            },
        }
    }
}

impl From<&Settings> for BoardConfig {
    fn from(settings: &Settings) -> Self {
        BoardConfig {
            label_settle_delay: std::time::Duration::from_secs(settings.label_settle_delay_sec),
            arrival_interact_delay: std::time::Duration::from_millis(
                settings.arrival_interact_delay_ms,
            ),
            page_size: settings.page_size,
            fresh_window: Duration::seconds(settings.fresh_window_sec),
            max_data_age: Duration::seconds(settings.max_data_age_sec),
            reconnect_base_delay: std::time::Duration::from_secs(
                settings.reconnect_base_delay_sec,
            ),
            max_reconnect_attempts: settings.max_reconnect_attempts,
            admin_api_key: settings.admin_api_key.clone(),
            ttl: CacheTtl {
                leaderboard: Duration::seconds(settings.ttl_leaderboard_sec),
                image: Duration::seconds(settings.ttl_image_sec),
                guilds: Duration::seconds(settings.ttl_guilds_sec),
                search: Duration::seconds(settings.ttl_search_sec),
                docs: Duration::seconds(settings.ttl_docs_sec),
            },
        }
    }
}

fn get_trace_level(level_str: &str) -> Level {
    match level_str.to_uppercase().as_str() {
        level if level == TRACE_LEVELS[0] => Level::TRACE,
        level if level == TRACE_LEVELS[1] => Level::DEBUG,
        level if level == TRACE_LEVELS[2] => Level::INFO,
        level if level == TRACE_LEVELS[3] => Level::WARN,
        level if level == TRACE_LEVELS[4] => Level::ERROR,
        // Default trace level
        _ => Level::INFO,
    }
}

fn default_trace_level() -> String {
    "INFO".to_string()
}

fn default_label_settle_delay_sec() -> u64 {
    30
}

fn default_arrival_interact_delay_ms() -> u64 {
    1000
}

fn default_page_size() -> usize {
    10
}

fn default_fresh_window_sec() -> i64 {
    5 * 60
}

fn default_max_data_age_sec() -> i64 {
    60 * 60
}

fn default_sweep_interval_sec() -> u64 {
    15 * 60
}

fn default_stats_interval_sec() -> u64 {
    15 * 60
}

fn default_reconnect_base_delay_sec() -> u64 {
    10
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_ttl_leaderboard_sec() -> i64 {
    300
}

fn default_ttl_image_sec() -> i64 {
    300
}

fn default_ttl_guilds_sec() -> i64 {
    600
}

fn default_ttl_search_sec() -> i64 {
    300
}

fn default_ttl_docs_sec() -> i64 {
    86400
}

fn default_cache_check_period_sec() -> u64 {
    60
}

fn default_head_base_url() -> String {
    "https://minotar.net/helm".to_string()
}

fn default_head_timeout_sec() -> u64 {
    5
}

use topboard::board::Board;
use topboard::cli::Cli;
use topboard::client::feed::{ReplayFeed, WorldFeed};
use topboard::client::heads::HeadFetcher;
use topboard::client::renderer::TemplateRenderer;
use topboard::config::{BoardConfig, Settings};
use topboard::engine::Engine;
use topboard::scheduler::{JobProcess, Scheduler};

use chrono::Utc;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli)?;

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(settings.get_trace_level())
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Setting default subscriber failed");

    let feed: Box<dyn WorldFeed> = match &settings.feed_capture {
        Some(path) => Box::new(ReplayFeed::load(path).await?),
        None => {
            warn!("No feed capture configured, the board will stay empty.");
            Box::new(ReplayFeed::idle())
        }
    };

    let heads = HeadFetcher::new(
        settings.head_base_url.clone(),
        Duration::from_secs(settings.head_timeout_sec),
    )?;
    let renderer = Arc::new(TemplateRenderer::new(heads));

    let board = Board::new(BoardConfig::from(&settings), Utc::now());
    let engine = Engine::new(board, feed, renderer);
    let handle = engine.handle();

    let mut sched = Scheduler::new(handle.clone()).await?;
    let jobs = vec![
        JobProcess::SweepStaleData(Duration::from_secs(settings.sweep_interval_sec)),
        JobProcess::PurgeExpiredCache(Duration::from_secs(settings.cache_check_period_sec)),
        JobProcess::ReportCacheStats(Duration::from_secs(settings.stats_interval_sec)),
    ];
    for job in jobs {
        sched.add_job(job).await?;
    }

    info!("Starting scheduler.");
    sched.start().await?;

    let running = tokio::spawn(engine.run());

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C, shutting down gracefully.");
    handle.shutdown();
    running.await??;
    sched.shutdown().await?;

    Ok(())
}

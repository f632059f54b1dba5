use crate::core::events::{EntityId, FeedEvent, Position};
use crate::error::{BoardError, BoardResult};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub type EventSink = UnboundedSender<FeedEvent>;

/// Connection to the game world. Actions are fire-and-forget; everything the
/// world reports back arrives as `FeedEvent`s on the sink given to `connect`.
pub trait WorldFeed: Send {
    fn connect(&mut self, sink: EventSink) -> BoardResult<()>;
    fn move_to(&mut self, position: Position) -> BoardResult<()>;
    fn interact_with(&mut self, entity: EntityId) -> BoardResult<()>;
    /// Ends the connection on purpose. No `Disconnected` event follows.
    fn disconnect(&mut self, reason: &str);
    fn is_live(&self) -> bool;
}

/// One line of a recorded feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CaptureEntry {
    // Delay since the previous entry.
    #[serde(default)]
    pub after_ms: u64,
    pub event: FeedEvent,
}

pub fn parse_capture(contents: &str) -> BoardResult<Vec<CaptureEntry>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str::<CaptureEntry>(line).map_err(|e| {
                BoardError::Feed(format!("capture line {}: {}", idx + 1, e))
            })
        })
        .collect()
}

/// Replays a recorded feed on every connect. A capture ends with the
/// world dropping the connection.
pub struct ReplayFeed {
    entries: Vec<CaptureEntry>,
    // Keeps the connection open after the last entry instead of dropping it.
    hold_open: bool,
    session: Option<CancellationToken>,
}

impl ReplayFeed {
    pub fn new(entries: Vec<CaptureEntry>) -> Self {
        ReplayFeed {
            entries,
            hold_open: false,
            session: None,
        }
    }

    /// A world where nothing ever happens.
    pub fn idle() -> Self {
        ReplayFeed {
            entries: vec![],
            hold_open: true,
            session: None,
        }
    }

    pub async fn load(path: &Path) -> BoardResult<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        let entries = parse_capture(&contents)?;
        info!("Loaded {} feed events from {}", entries.len(), path.display());
        Ok(ReplayFeed::new(entries))
    }

    fn end_session(&mut self) {
        if let Some(token) = self.session.take() {
            token.cancel();
        }
    }
}

impl WorldFeed for ReplayFeed {
    fn connect(&mut self, sink: EventSink) -> BoardResult<()> {
        self.end_session();
        let token = CancellationToken::new();
        self.session = Some(token.clone());

        let entries = self.entries.clone();
        let hold_open = self.hold_open;
        tokio::spawn(async move {
            let replay = async {
                sink.send(FeedEvent::Connected).ok()?;
                for entry in entries {
                    tokio::time::sleep(Duration::from_millis(entry.after_ms)).await;
                    sink.send(entry.event).ok()?;
                }
                if !hold_open {
                    sink.send(FeedEvent::Disconnected {
                        reason: "capture ended".to_string(),
                    })
                    .ok()?;
                }
                Some(())
            };

            tokio::select! {
                _ = token.cancelled() => debug!("Replay session cancelled."),
                done = replay => {
                    if done.is_none() {
                        warn!("Feed event receiver dropped, replay stopped.");
                    }
                }
            }
        });
        Ok(())
    }

    fn move_to(&mut self, position: Position) -> BoardResult<()> {
        info!("Moving to ({:.1}, {:.1}, {:.1})", position.x, position.y, position.z);
        Ok(())
    }

    fn interact_with(&mut self, entity: EntityId) -> BoardResult<()> {
        info!("Interacting with entity {}", entity.0);
        Ok(())
    }

    fn disconnect(&mut self, reason: &str) {
        info!("Disconnecting feed: {}", reason);
        self.end_session();
    }

    fn is_live(&self) -> bool {
        self.session
            .as_ref()
            .map_or(false, |token| !token.is_cancelled())
    }
}

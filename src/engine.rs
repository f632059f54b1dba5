use crate::api::models::{
    ApiReply, CacheClearRequest, CategoryQuery, LeaderboardOutcome, LeaderboardQuery,
    LeaderboardRequest, RenderJob, SearchQuery,
};
use crate::board::Board;
use crate::client::{feed::WorldFeed, renderer::Renderer};
use crate::core::{
    category::Category,
    events::{FeedEvent, Request, Timer},
    templates::BoardTemplate,
};
use crate::error::{BoardError, BoardResult};
use bytes::Bytes;
use chrono::Utc;
use minijinja::context;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// Turns waiting to be applied; feed bursts are small, queries are answered quickly.
const TURN_QUEUE_CAPACITY: usize = 256;

pub type ApiResponse = BoardResult<ApiReply>;

#[derive(Debug)]
pub enum ApiCall {
    Leaderboard(LeaderboardRequest),
    Guilds(Category),
    Search {
        term: Option<String>,
        category: Category,
    },
    Health,
    Docs,
    ClearCache(CacheClearRequest),
}

/// Everything that can change the board, applied one at a time.
#[derive(Debug)]
pub enum Turn {
    Feed(FeedEvent),
    Timer(Timer),
    Sweep,
    PurgeCache,
    ReportStats,
    Api(ApiCall, oneshot::Sender<ApiResponse>),
    Rendered {
        job: RenderJob,
        result: BoardResult<Bytes>,
        reply: oneshot::Sender<ApiResponse>,
    },
    Restart,
}

/// Sole owner of the `Board`. Side effects requested by a turn are carried out
/// right after it, and their outcomes come back as later turns.
pub struct Engine {
    board: Board,
    feed: Box<dyn WorldFeed>,
    renderer: Arc<dyn Renderer>,
    sender: mpsc::Sender<Turn>,
    receiver: mpsc::Receiver<Turn>,
    shutdown: CancellationToken,
}

impl Engine {
    pub fn new(board: Board, feed: Box<dyn WorldFeed>, renderer: Arc<dyn Renderer>) -> Self {
        let (sender, receiver) = mpsc::channel::<Turn>(TURN_QUEUE_CAPACITY);
        Engine {
            board,
            feed,
            renderer,
            sender,
            receiver,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            sender: self.sender.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    pub async fn run(mut self) -> BoardResult<()> {
        info!("Starting leaderboard engine.");
        self.board.start();
        self.execute();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                turn = self.receiver.recv() => match turn {
                    Some(turn) => {
                        self.apply(turn);
                        self.execute();
                    }
                    // Unreachable while we hold a sender ourselves.
                    None => break,
                },
            }
        }

        info!("Stopping leaderboard engine.");
        self.board.shutdown("Server shutting down");
        self.execute();
        Ok(())
    }

    fn apply(&mut self, turn: Turn) {
        let now = Utc::now();
        match turn {
            Turn::Feed(event) => self.board.on_feed_event(event, now),
            Turn::Timer(timer) => self.board.on_timer(timer),
            Turn::Sweep => {
                let reset = self.board.sweep(now);
                debug!("Sweep reset freshness of {} categories", reset.len());
            }
            Turn::PurgeCache => {
                let purged = self.board.purge_cache(now);
                if purged > 0 {
                    debug!("Purged {} expired cache entries", purged);
                }
            }
            Turn::ReportStats => self.report_stats(),
            Turn::Api(call, reply) => self.answer(call, reply),
            Turn::Rendered { job, result, reply } => {
                let response = self.board.finish_render(job, result, now);
                let _ = reply.send(response);
            }
            Turn::Restart => {
                info!("Manual restart of the feed requested.");
                self.board.start();
            }
        }
    }

    fn answer(&mut self, call: ApiCall, reply: oneshot::Sender<ApiResponse>) {
        let now = Utc::now();
        let response = match call {
            ApiCall::Leaderboard(request) => match self.board.leaderboard(&request, now) {
                Ok(LeaderboardOutcome::Ready(ready)) => Ok(ready),
                Ok(LeaderboardOutcome::Render(job)) => {
                    self.spawn_render(job, reply);
                    return;
                }
                Err(e) => Err(e),
            },
            ApiCall::Guilds(category) => self.board.guilds(category, now),
            ApiCall::Search { term, category } => {
                self.board.search(term.as_deref(), category, now)
            }
            ApiCall::Health => serde_json::to_value(self.board.health(now))
                .map(|data| ApiReply::Json {
                    cached: false,
                    data,
                })
                .map_err(BoardError::from),
            ApiCall::Docs => Ok(self.board.docs(now)),
            ApiCall::ClearCache(request) => self.board.clear_cache(&request),
        };

        if let Err(e) = &response {
            match e.is_client_error() {
                true => debug!("Rejected query: {}", e),
                false => error!("Query failed: {}", e),
            }
        }
        // The caller may have given up waiting.
        let _ = reply.send(response);
    }

    fn spawn_render(&self, job: RenderJob, reply: oneshot::Sender<ApiResponse>) {
        let rendering = self.renderer.render(job.clone());
        let sender = self.sender.clone();
        tokio::spawn(async move {
            let result = rendering.await;
            if let Err(e) = sender.send(Turn::Rendered { job, result, reply }).await {
                error!("Could not hand rendered image back to the engine. {e}");
            }
        });
    }

    fn report_stats(&self) {
        let stats = self.board.cache().stats();
        let line = BoardTemplate::CacheStats.get().and_then(|template| {
            template
                .render(context! {
                    keys => stats.keys,
                    hits => stats.hits,
                    misses => stats.misses,
                    hit_rate => stats.hit_rate,
                })
                .map_err(BoardError::from)
        });
        match line {
            Ok(line) => info!("{}", line),
            Err(e) => error!("Could not format cache stats. {e}"),
        }
    }

    /// Carries out queued requests until the board stops asking for more.
    fn execute(&mut self) {
        let mut requests = self.board.take_requests();
        while !requests.is_empty() {
            for request in requests {
                debug!("Executing {}", request);
                if let Err(e) = self.perform(request) {
                    warn!("{e}");
                    if !self.feed.is_live() {
                        let reason = e.to_string();
                        self.board
                            .on_feed_event(FeedEvent::Disconnected { reason }, Utc::now());
                    }
                }
            }
            requests = self.board.take_requests();
        }
    }

    fn perform(&mut self, request: Request) -> BoardResult<()> {
        match request {
            Request::Connect => {
                let (sink, mut events) = mpsc::unbounded_channel::<FeedEvent>();
                let sender = self.sender.clone();
                tokio::spawn(async move {
                    while let Some(event) = events.recv().await {
                        if sender.send(Turn::Feed(event)).await.is_err() {
                            break;
                        }
                    }
                });
                self.feed.connect(sink)
            }
            Request::MoveTo(position) => self.feed.move_to(position),
            Request::InteractWith(entity) => self.feed.interact_with(entity),
            Request::Disconnect(reason) => {
                self.feed.disconnect(&reason);
                Ok(())
            }
            Request::Schedule { after, timer } => {
                let sender = self.sender.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    // Closed only once the engine is gone.
                    let _ = sender.send(Turn::Timer(timer)).await;
                });
                Ok(())
            }
        }
    }
}

/// Cloneable entry point to a running engine; the query surface of the service.
#[derive(Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<Turn>,
    shutdown: CancellationToken,
}

impl EngineHandle {
    pub async fn send(&self, turn: Turn) -> BoardResult<()> {
        self.sender
            .send(turn)
            .await
            .map_err(|e| BoardError::ChannelSend(format!("Engine is not running. {e}")))
    }

    async fn call(&self, call: ApiCall) -> ApiResponse {
        let (reply, response) = oneshot::channel();
        self.send(Turn::Api(call, reply)).await?;
        response
            .await
            .map_err(|e| BoardError::ChannelSend(format!("Engine dropped the request. {e}")))?
    }

    pub async fn leaderboard(&self, query: LeaderboardQuery) -> ApiResponse {
        let request = LeaderboardRequest::try_from(query)?;
        self.call(ApiCall::Leaderboard(request)).await
    }

    pub async fn guilds(&self, query: CategoryQuery) -> ApiResponse {
        let category = query.category()?;
        self.call(ApiCall::Guilds(category)).await
    }

    pub async fn search(&self, query: SearchQuery) -> ApiResponse {
        let category = query.category()?;
        self.call(ApiCall::Search {
            term: query.q,
            category,
        })
        .await
    }

    pub async fn health(&self) -> ApiResponse {
        self.call(ApiCall::Health).await
    }

    pub async fn docs(&self) -> ApiResponse {
        self.call(ApiCall::Docs).await
    }

    pub async fn clear_cache(&self, request: CacheClearRequest) -> ApiResponse {
        self.call(ApiCall::ClearCache(request)).await
    }

    /// Starts the feed again, e.g. after reconnection gave up. Meant for the
    /// gateway's admin surface, the process itself never calls it.
    pub async fn restart(&self) -> BoardResult<()> {
        self.send(Turn::Restart).await
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::feed::{parse_capture, ReplayFeed};
    use crate::config::BoardConfig;
    use futures::future::BoxFuture;
    use serde_json::Value;
    use std::time::Duration;

    struct EchoRenderer;

    impl Renderer for EchoRenderer {
        fn render(&self, job: RenderJob) -> BoxFuture<'static, BoardResult<Bytes>> {
            Box::pin(async move { Ok(Bytes::from(format!("{} rows", job.records.len()))) })
        }
    }

    const CAPTURE: &str = r##"
{"after_ms": 0, "event": {"type": "data_line_observed", "text": "#1 §6PlayerA §b[Crew] (5 Hours)"}}
{"after_ms": 0, "event": {"type": "data_line_observed", "text": "#2 PlayerB (2 Days)"}}
{"after_ms": 0, "event": {"type": "label_observed", "text": "§r§f[Lifetime] §6[§6§l§nMonthly§6] §f[Weekly]", "source": {"entity": 3, "position": {"x": 1.0, "y": 2.0, "z": 3.0}}}}
"##;

    fn engine() -> Engine {
        let feed = ReplayFeed::new(parse_capture(CAPTURE).unwrap());
        Engine::new(
            Board::new(BoardConfig::default(), Utc::now()),
            Box::new(feed),
            Arc::new(EchoRenderer),
        )
    }

    async fn until_populated(handle: &EngineHandle) -> Value {
        for _ in 0..100 {
            if let Ok(ApiReply::Json { data, .. }) =
                handle.leaderboard(LeaderboardQuery::default()).await
            {
                return data;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("board never got populated");
    }

    #[tokio::test]
    async fn replayed_feed_becomes_queryable() {
        let engine = engine();
        let handle = engine.handle();
        let running = tokio::spawn(engine.run());

        let data = until_populated(&handle).await;
        assert_eq!(data["pagination"]["totalItems"], 2);
        assert_eq!(data["players"][1]["hoursPlayed"], 48);

        let image = handle
            .leaderboard(LeaderboardQuery {
                output: Some("image".to_string()),
                ..LeaderboardQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(
            image,
            ApiReply::Image {
                cached: false,
                bytes: Bytes::from_static(b"2 rows"),
            }
        );

        let health = match handle.health().await.unwrap() {
            ApiReply::Json { data, .. } => data,
            other => panic!("{other:?}"),
        };
        assert_eq!(health["data"]["MONTHLY"]["playerCount"], 2);

        handle.shutdown();
        running.await.unwrap().unwrap();
        assert!(handle.health().await.is_err());
    }

    #[tokio::test]
    async fn invalid_queries_never_reach_the_engine() {
        let engine = engine();
        let handle = engine.handle();
        drop(engine);

        let error = handle
            .leaderboard(LeaderboardQuery {
                limit: Some("500".to_string()),
                ..LeaderboardQuery::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(error, BoardError::Validation(_)));

        // A valid query needs the engine, which is gone.
        let error = handle.docs().await.unwrap_err();
        assert!(matches!(error, BoardError::ChannelSend(_)));
    }
}

use crate::error::{BoardError, BoardResult};
use bytes::Bytes;
use futures::future::join_all;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Player head icon, or a rank-colored stand-in when it could not be fetched.
#[derive(Debug, Clone, PartialEq)]
pub enum Head {
    Icon(Bytes),
    Placeholder(String),
}

impl Head {
    /// Short marker shown next to a row of the text card.
    pub fn marker(&self) -> String {
        match self {
            Head::Icon(_) => "[head]".to_string(),
            Head::Placeholder(color) => format!("[{}]", color),
        }
    }
}

pub fn placeholder_color(rank: u32) -> String {
    match rank {
        1 => "#FFD700".to_string(),
        2 => "#C0C0C0".to_string(),
        3 => "#CD7F32".to_string(),
        n => format!("hsl({}, 70%, 60%)", (n * 36) % 360),
    }
}

pub struct HeadFetcher {
    http_client: Client,
    base_url: String,
}

impl HeadFetcher {
    pub fn new(base_url: String, timeout: Duration) -> BoardResult<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get(&self, username: &str) -> BoardResult<Bytes> {
        let url = format!("{}/{}/100.png", self.base_url, username);
        let response = self.http_client.get(&url).send().await?;

        match response.status() {
            StatusCode::OK => Ok(response.bytes().await?),
            status => Err(BoardError::Http(format!("{} for {}", status, url))),
        }
    }

    /// Fetches every head concurrently. Output order follows `players`.
    pub async fn fetch_all(&self, players: &[(String, u32)]) -> Vec<Head> {
        let requests = players.iter().map(|(username, rank)| async move {
            match self.get(username).await {
                Ok(bytes) => Head::Icon(bytes),
                Err(e) => {
                    debug!("No head for {}: {}", username, e);
                    Head::Placeholder(placeholder_color(*rank))
                }
            }
        });
        join_all(requests).await
    }
}

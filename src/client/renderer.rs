use crate::api::models::RenderJob;
use crate::client::heads::{Head, HeadFetcher};
use crate::core::{display, templates::BoardTemplate};
use crate::error::BoardResult;
use bytes::Bytes;
use futures::future::BoxFuture;
use minijinja::context;
use std::sync::Arc;

/// Turns a page of records into image bytes, off the engine turn.
pub trait Renderer: Send + Sync {
    fn render(&self, job: RenderJob) -> BoxFuture<'static, BoardResult<Bytes>>;
}

pub fn card(job: &RenderJob, heads: &[Head]) -> BoardResult<String> {
    let avatars = heads.iter().map(Head::marker).collect::<Vec<String>>();
    let table = display::board(&job.records, &avatars);

    let card = BoardTemplate::LeaderboardCard.get()?.render(context! {
        category => job.category.to_string(),
        guild => job.guild,
        as_of => job.as_of.format("%d/%m/%Y %H:%M:%S").to_string(),
        table => table,
    })?;
    Ok(card)
}

/// Fixed-width text card with a head marker on every row.
pub struct TemplateRenderer {
    heads: Arc<HeadFetcher>,
}

impl TemplateRenderer {
    pub fn new(heads: HeadFetcher) -> Self {
        TemplateRenderer {
            heads: Arc::new(heads),
        }
    }
}

impl Renderer for TemplateRenderer {
    fn render(&self, job: RenderJob) -> BoxFuture<'static, BoardResult<Bytes>> {
        let heads = self.heads.clone();
        Box::pin(async move {
            let players = job
                .records
                .iter()
                .map(|p| (p.clean_username.clone(), p.record.rank))
                .collect::<Vec<(String, u32)>>();
            let fetched = heads.fetch_all(&players).await;
            Ok(Bytes::from(card(&job, &fetched)?))
        })
    }
}

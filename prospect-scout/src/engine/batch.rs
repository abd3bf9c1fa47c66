// Population-wide batch jobs that refresh the stored feature and rating
// caches. One player's failure never aborts the run.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::engine::context::EngineContext;
use crate::engine::features::Mode;
use crate::engine::ratings;
use crate::model::PlayerRecord;
use crate::store::{ResultSink, StatSource, UpsertOutcome};

/// Per-run outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl BatchReport {
    fn record(&mut self, outcome: Result<UpsertOutcome>, player: &PlayerRecord, job: &str) {
        self.processed += 1;
        match outcome {
            Ok(UpsertOutcome::Created) => self.created += 1,
            Ok(UpsertOutcome::Updated) => self.updated += 1,
            Ok(UpsertOutcome::Unchanged) => self.unchanged += 1,
            Err(e) => {
                self.failed += 1;
                warn!("{job}: skipping player {} ({}): {:#}", player.id, player.name, e);
            }
        }
    }
}

fn run<S, F>(ctx: &EngineContext<'_, S>, job: &str, mut step: F) -> Result<BatchReport>
where
    S: StatSource + ResultSink + ?Sized,
    F: FnMut(&PlayerRecord) -> Result<UpsertOutcome>,
{
    let players = ctx.source.players()?;
    let mut report = BatchReport::default();
    for player in &players {
        report.record(step(player), player, job);
    }
    info!(
        "{job}: {} processed, {} created, {} updated, {} unchanged, {} failed",
        report.processed, report.created, report.updated, report.unchanged, report.failed
    );
    Ok(report)
}

/// Store every player's `all`-mode feature vector.
pub fn populate_features<S: StatSource + ResultSink + ?Sized>(
    ctx: &EngineContext<'_, S>,
) -> Result<BatchReport> {
    run(ctx, "populate_features", |player| {
        let vector = ctx.vector(player, Mode::All, None)?;
        ctx.source.upsert_features(player.id, &vector)
    })
}

/// Store every player's rating profile.
pub fn populate_ratings<S: StatSource + ResultSink + ?Sized>(
    ctx: &EngineContext<'_, S>,
) -> Result<BatchReport> {
    run(ctx, "populate_ratings", |player| {
        let profile = ratings::rate(ctx, player)?;
        ctx.source.upsert_rating(player.id, &profile)
    })
}

/// Run a synchronous engine job on the blocking thread pool.
pub async fn run_blocking<T, F>(job: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .context("batch worker panicked")?
}

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::parser::{self, InfoRecord};
use crate::wiki::{article_url, FetchError, PageSource};

/// Result for one subject. Failures carry the same `name`/`url` pair plus
/// the error text so they sit in the output array next to successes.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SubjectOutcome {
    Found(InfoRecord),
    Failed(FailedSubject),
}

#[derive(Debug, Serialize)]
pub struct FailedSubject {
    pub name: String,
    pub url: String,
    pub error: String,
}

impl SubjectOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, SubjectOutcome::Failed(_))
    }
}

pub struct BatchOptions {
    pub base_url: String,
    pub concurrency: usize,
    /// Abort on the first failed subject instead of recording it.
    pub fail_fast: bool,
}

/// Fetch and extract every subject, at most `concurrency` at a time.
/// The returned outcomes line up index-for-index with `subjects`.
pub async fn collect_records<S>(
    source: Arc<S>,
    subjects: &[String],
    opts: &BatchOptions,
) -> Result<Vec<SubjectOutcome>>
where
    S: PageSource + 'static,
{
    let total = subjects.len();
    let jobs: Vec<(usize, String, String)> = subjects
        .iter()
        .enumerate()
        .map(|(idx, s)| (idx, s.clone(), article_url(&opts.base_url, s)))
        .collect();
    let urls: Vec<String> = jobs.iter().map(|(_, _, url)| url.clone()).collect();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let concurrency = opts.concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let (tx, mut rx) =
        tokio::sync::mpsc::channel::<(usize, Result<InfoRecord, FetchError>)>(concurrency * 2);

    // Permits are taken in input order so requests start in input order.
    let dispatcher = tokio::spawn(async move {
        for (idx, subject, url) in jobs {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let source = Arc::clone(&source);
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = {
                    let _permit = permit;
                    fetch_one(source.as_ref(), &subject, &url).await
                };
                let _ = tx.send((idx, result)).await;
            });
        }
    });

    let started = Instant::now();
    let mut slots: Vec<Option<Result<InfoRecord, FetchError>>> =
        (0..total).map(|_| None).collect();
    // Every index below `settled` has reported and succeeded.
    let mut settled = 0usize;

    while let Some((idx, result)) = rx.recv().await {
        let subject = &subjects[idx];
        if let Err(e) = &result {
            warn!("Fetch failed for {}: {}", subject, e);
        }
        slots[idx] = Some(result);
        pb.set_message(subject.clone());
        pb.inc(1);

        // Under fail-fast, abort on the earliest failing subject in input
        // order, so wait until everything before it has reported.
        if opts.fail_fast {
            while let Some(Some(slot)) = slots.get(settled) {
                if slot.is_err() {
                    break;
                }
                settled += 1;
            }
            if let Some(Some(Err(_))) = slots.get(settled) {
                dispatcher.abort();
                pb.finish_and_clear();
                if let Some(Err(e)) = slots[settled].take() {
                    return Err(anyhow::Error::new(e)
                        .context(format!("Failed to fetch {}", subjects[settled])));
                }
            }
        }
    }

    pb.finish_and_clear();

    let mut outcomes = Vec::with_capacity(total);
    for (idx, slot) in slots.into_iter().enumerate() {
        let outcome = match slot.context("A fetch task ended without reporting a result")? {
            Ok(record) => SubjectOutcome::Found(record),
            Err(e) => SubjectOutcome::Failed(FailedSubject {
                name: subjects[idx].clone(),
                url: urls[idx].clone(),
                error: e.to_string(),
            }),
        };
        outcomes.push(outcome);
    }

    let errors = outcomes.iter().filter(|o| o.is_failed()).count();
    info!(
        "Fetched {} subjects ({} ok, {} errors) in {:.1}s",
        total,
        total - errors,
        errors,
        started.elapsed().as_secs_f64()
    );
    Ok(outcomes)
}

async fn fetch_one<S: PageSource + ?Sized>(
    source: &S,
    subject: &str,
    url: &str,
) -> Result<InfoRecord, FetchError> {
    let html = source.fetch(url).await?;
    Ok(parser::extract_record(subject, url, &html))
}

/// Two-space indented JSON; non-ASCII is written as-is.
pub fn render_json(outcomes: &[SubjectOutcome]) -> Result<String> {
    Ok(serde_json::to_string_pretty(outcomes)?)
}

// ── Tests ──

//! Stage job queues
//!
//! One in-process queue per stage. Senders are cheap to clone and live in
//! app state; each stage gets a worker loop that pulls payloads and runs
//! them under a semaphore sized for that stage. Payloads for demos deleted
//! mid-flight are tolerated by the stages themselves.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use demoreel_core::dto::payload::{MergePayload, ParsePayload, RecordPayload, TtsPayload};
use tokio::sync::Semaphore;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{error, warn};

use crate::stages;
use crate::state::AppState;

#[derive(Clone)]
pub struct JobQueues {
    parse_tx: UnboundedSender<ParsePayload>,
    record_tx: UnboundedSender<RecordPayload>,
    tts_tx: UnboundedSender<TtsPayload>,
    merge_tx: UnboundedSender<MergePayload>,
}

pub struct QueueReceivers {
    parse_rx: UnboundedReceiver<ParsePayload>,
    record_rx: UnboundedReceiver<RecordPayload>,
    tts_rx: UnboundedReceiver<TtsPayload>,
    merge_rx: UnboundedReceiver<MergePayload>,
}

impl JobQueues {
    pub fn enqueue_parse(&self, payload: ParsePayload) {
        if self.parse_tx.send(payload).is_err() {
            error!("parse queue closed, dropping job");
        }
    }

    pub fn enqueue_record(&self, payload: RecordPayload) {
        if self.record_tx.send(payload).is_err() {
            error!("record queue closed, dropping job");
        }
    }

    pub fn enqueue_tts(&self, payload: TtsPayload) {
        if self.tts_tx.send(payload).is_err() {
            error!("tts queue closed, dropping job");
        }
    }

    pub fn enqueue_merge(&self, payload: MergePayload) {
        if self.merge_tx.send(payload).is_err() {
            error!("merge queue closed, dropping job");
        }
    }
}

/// Build the queue pair. Senders go into app state, receivers into
/// [`spawn_workers`].
pub fn job_queues() -> (JobQueues, QueueReceivers) {
    let (parse_tx, parse_rx) = mpsc::unbounded_channel();
    let (record_tx, record_rx) = mpsc::unbounded_channel();
    let (tts_tx, tts_rx) = mpsc::unbounded_channel();
    let (merge_tx, merge_rx) = mpsc::unbounded_channel();

    (
        JobQueues {
            parse_tx,
            record_tx,
            tts_tx,
            merge_tx,
        },
        QueueReceivers {
            parse_rx,
            record_rx,
            tts_rx,
            merge_rx,
        },
    )
}

/// Spawn one worker loop per stage.
pub fn spawn_workers(state: AppState, receivers: QueueReceivers) {
    let config = state.config();

    spawn_stage_loop(
        state.clone(),
        receivers.parse_rx,
        config.parse_concurrency,
        |state, payload| async move { stages::parse::run(state, payload).await },
    );
    spawn_stage_loop(
        state.clone(),
        receivers.record_rx,
        config.record_concurrency,
        |state, payload| async move { stages::record::run(state, payload).await },
    );
    spawn_stage_loop(
        state.clone(),
        receivers.tts_rx,
        config.tts_concurrency,
        |state, payload| async move { stages::tts::run(state, payload).await },
    );
    spawn_stage_loop(
        state,
        receivers.merge_rx,
        config.merge_concurrency,
        |state, payload| async move { stages::merge::run(state, payload).await },
    );
}

fn spawn_stage_loop<P, F, Fut>(
    state: AppState,
    mut rx: UnboundedReceiver<P>,
    concurrency: usize,
    handler: F,
) where
    P: Send + 'static,
    F: Fn(AppState, P) -> Fut + Send + Sync + Copy + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        while let Some(payload) = rx.recv().await {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let state = state.clone();
            tokio::spawn(async move {
                handler(state, payload).await;
                drop(permit);
            });
        }
    });
}

/// Run `operation` up to `attempts` times with exponential backoff.
pub async fn with_retries<T, E, F, Fut>(
    attempts: u32,
    base_delay: Duration,
    label: &str,
    mut operation: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = attempts.max(1);
    let mut delay = base_delay;
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!(
                    "{} attempt {}/{} failed: {}, retrying in {:?}",
                    label, attempt, attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_with_retries_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> =
            with_retries(3, Duration::from_millis(1), "op", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 { Err(format!("failure {n}")) } else { Ok(n) }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retries_gives_up_after_last_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> =
            with_retries(2, Duration::from_millis(1), "op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("still broken".to_string())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_with_retries_single_attempt_does_not_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> =
            with_retries(1, Duration::from_millis(1), "op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("fatal".to_string())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

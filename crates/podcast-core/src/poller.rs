//! TaskPoller: background reconciler for jobs waiting on synthesized audio.
//!
//! Each queued batch number is re-queried once per tick.  Per item:
//! ```text
//!  Queued ── still processing / query miss ──▶ Queued[retry + 1]
//!  Queued ── TTS stage has audio ───────────▶ Delivered (pushed to playlist, removed)
//!  Queued ── task or TTS stage failed ──────▶ Dropped (removed)
//!  Queued[max_retries] ─────────────────────▶ Dropped (removed)
//! ```
//! The repeating timer runs exactly while the queue is non-empty.  Nothing
//! here returns an error; outcomes are only visible through `PollerEvent`s.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Local};
use futures_util::future::join_all;
use podcast_proto::config::PollerConfig;
use podcast_proto::protocol::{PodcastAudio, PodcastTask, StageName, StageStatus};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::playlist::AudioPlaylist;
use crate::query::TaskQuery;
use crate::timer::RepeatingTimer;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub batch_no: String,
    pub retry_count: u32,
    pub enqueued_at: DateTime<Local>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    TaskFailed,
    StageFailed,
    RetriesExhausted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollerEvent {
    Enqueued { batch_no: String },
    Retried { batch_no: String, retry_count: u32 },
    Delivered { batch_no: String, stage_id: u64 },
    /// The TTS stage was already in the playlist; the job left the queue
    /// without adding anything.
    Duplicate { batch_no: String, stage_id: u64 },
    Dropped { batch_no: String, reason: DropReason },
    /// Removed by the caller, not by a tick.
    Removed { batch_no: String },
    Cleared,
}

/// What one query says about a job.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Pending,
    Failed(DropReason),
    Ready { stage_id: u64, audio: PodcastAudio },
}

impl Outcome {
    /// Decide from a task snapshot.  Only the latest TTS stage counts.
    pub fn of(task: &PodcastTask) -> Self {
        if task.is_failed() {
            return Outcome::Failed(DropReason::TaskFailed);
        }

        let Some(stage) = task.last_stage(StageName::Tts) else {
            return Outcome::Pending;
        };

        match stage.status {
            StageStatus::Processing => Outcome::Pending,
            StageStatus::Failed => Outcome::Failed(DropReason::StageFailed),
            StageStatus::Completed => match &stage.audio {
                Some(audio) if audio.has_source() => Outcome::Ready {
                    stage_id: stage.id,
                    audio: audio.clone(),
                },
                // Completed but audio not attached yet.
                _ => Outcome::Pending,
            },
        }
    }
}

#[derive(Clone)]
pub struct TaskPoller {
    inner: Arc<Inner>,
}

struct Inner {
    queue: Mutex<Vec<QueueItem>>,
    timer: Mutex<RepeatingTimer>,
    query: Arc<dyn TaskQuery>,
    playlist: AudioPlaylist,
    max_retries: u32,
    events: broadcast::Sender<PollerEvent>,
}

impl TaskPoller {
    pub fn new(
        query: Arc<dyn TaskQuery>,
        playlist: AudioPlaylist,
        interval: Duration,
        max_retries: u32,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(Vec::new()),
                timer: Mutex::new(RepeatingTimer::new(interval)),
                query,
                playlist,
                max_retries: max_retries.max(1),
                events,
            }),
        }
    }

    pub fn from_config(
        config: &PollerConfig,
        query: Arc<dyn TaskQuery>,
        playlist: AudioPlaylist,
    ) -> Self {
        Self::new(query, playlist, config.interval(), config.max_retries)
    }

    fn queue(&self) -> MutexGuard<'_, Vec<QueueItem>> {
        self.inner.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn timer(&self) -> MutexGuard<'_, RepeatingTimer> {
        self.inner.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: PollerEvent) {
        let _ = self.inner.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PollerEvent> {
        self.inner.events.subscribe()
    }

    pub fn max_retries(&self) -> u32 {
        self.inner.max_retries
    }

    pub fn items(&self) -> Vec<QueueItem> {
        self.queue().clone()
    }

    pub fn len(&self) -> usize {
        self.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }

    pub fn contains(&self, batch_no: &str) -> bool {
        self.queue().iter().any(|item| item.batch_no == batch_no)
    }

    pub fn retry_count(&self, batch_no: &str) -> Option<u32> {
        self.queue()
            .iter()
            .find(|item| item.batch_no == batch_no)
            .map(|item| item.retry_count)
    }

    pub fn is_polling(&self) -> bool {
        self.timer().is_running()
    }

    // ── Queue ────────────────────────────────────────────────────────────────

    /// Start watching a job.  Already-queued batch numbers are ignored apart
    /// from restarting a timer that could not start earlier.
    pub fn enqueue(&self, batch_no: impl Into<String>) -> bool {
        let batch_no = batch_no.into();
        {
            let mut queue = self.queue();
            if queue.iter().any(|item| item.batch_no == batch_no) {
                drop(queue);
                self.start_polling();
                return false;
            }
            queue.push(QueueItem {
                batch_no: batch_no.clone(),
                retry_count: 0,
                enqueued_at: Local::now(),
            });
        }

        info!("poller: watching {}", batch_no);
        self.emit(PollerEvent::Enqueued { batch_no });
        self.start_polling();
        true
    }

    pub fn remove_from_queue(&self, batch_no: &str) -> bool {
        let removed = self.take(batch_no).is_some();
        if removed {
            self.emit(PollerEvent::Removed {
                batch_no: batch_no.to_string(),
            });
        }
        removed
    }

    /// Bump the retry counter; the item is dropped once it reaches
    /// `max_retries`.
    pub fn incr_retry(&self, batch_no: &str) {
        let retry_count = {
            let mut queue = self.queue();
            let Some(item) = queue.iter_mut().find(|item| item.batch_no == batch_no) else {
                return;
            };
            item.retry_count += 1;
            item.retry_count
        };

        debug!("poller: {} retry {}/{}", batch_no, retry_count, self.inner.max_retries);
        self.emit(PollerEvent::Retried {
            batch_no: batch_no.to_string(),
            retry_count,
        });

        if retry_count >= self.inner.max_retries {
            warn!("poller: giving up on {} after {} attempts", batch_no, retry_count);
            self.drop_item(batch_no, DropReason::RetriesExhausted);
        }
    }

    /// Stop the timer and forget every job.  Requests already in flight are
    /// not cancelled, but their results are discarded.
    pub fn clear_queue(&self) {
        self.stop_polling();
        self.queue().clear();
        self.emit(PollerEvent::Cleared);
    }

    fn take(&self, batch_no: &str) -> Option<QueueItem> {
        let (item, now_empty) = {
            let mut queue = self.queue();
            let pos = queue.iter().position(|item| item.batch_no == batch_no)?;
            let item = queue.remove(pos);
            (item, queue.is_empty())
        };
        if now_empty {
            self.stop_polling();
        }
        Some(item)
    }

    fn drop_item(&self, batch_no: &str, reason: DropReason) {
        if self.take(batch_no).is_some() {
            self.emit(PollerEvent::Dropped {
                batch_no: batch_no.to_string(),
                reason,
            });
        }
    }

    // ── Timer ────────────────────────────────────────────────────────────────

    pub fn start_polling(&self) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let mut timer = self.timer();
        let period = timer.period();
        let started = timer.start(move || {
            let weak = weak.clone();
            async move {
                // Session dropped: nothing left to poll for.
                let Some(inner) = weak.upgrade() else {
                    return ControlFlow::Break(());
                };
                TaskPoller { inner }.check_queue().await;
                ControlFlow::Continue(())
            }
        });
        if started {
            debug!("poller: polling every {:?}", period);
        }
    }

    pub fn stop_polling(&self) {
        let mut timer = self.timer();
        if timer.is_running() {
            timer.stop();
            debug!("poller: polling stopped");
        }
    }

    // ── Tick ─────────────────────────────────────────────────────────────────

    /// One polling cycle.  The batch is a snapshot of the queue taken now;
    /// jobs enqueued while it runs wait for the next tick.  All queries are
    /// in flight at once and the cycle returns when every one has resolved.
    pub async fn check_queue(&self) {
        let batch: Vec<String> = self
            .queue()
            .iter()
            .map(|item| item.batch_no.clone())
            .collect();
        if batch.is_empty() {
            return;
        }

        debug!("poller: checking {} job(s)", batch.len());
        join_all(batch.iter().map(|batch_no| self.check_one(batch_no))).await;
    }

    async fn check_one(&self, batch_no: &str) {
        let outcome = match self.inner.query.get_task(batch_no).await {
            Ok(Some(task)) => Outcome::of(&task),
            Ok(None) => Outcome::Pending,
            Err(e) => {
                warn!("poller: query for {} failed: {}", batch_no, e);
                Outcome::Pending
            }
        };
        self.apply(batch_no, outcome);
    }

    fn apply(&self, batch_no: &str, outcome: Outcome) {
        match outcome {
            Outcome::Pending => self.incr_retry(batch_no),
            Outcome::Failed(reason) => {
                info!("poller: {} failed ({:?})", batch_no, reason);
                self.drop_item(batch_no, reason);
            }
            Outcome::Ready { stage_id, audio } => {
                if self.take(batch_no).is_none() {
                    debug!("poller: {} left the queue mid-tick, discarding audio", batch_no);
                    return;
                }
                if self.inner.playlist.add(stage_id, audio) {
                    info!("poller: {} ready, queueing stage {}", batch_no, stage_id);
                    self.emit(PollerEvent::Delivered {
                        batch_no: batch_no.to_string(),
                        stage_id,
                    });
                } else {
                    info!("poller: {} ready, stage {} already queued", batch_no, stage_id);
                    self.emit(PollerEvent::Duplicate {
                        batch_no: batch_no.to_string(),
                        stage_id,
                    });
                }
            }
        }
    }
}

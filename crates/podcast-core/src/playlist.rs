//! AudioPlaylist: linear playback queue with a single play/pause flag.
//!
//! Index 0 is always the current track.  New arrivals land at the tail, so
//! adding while something plays never reorders ahead of it.  The store never
//! touches an audio device; it only exposes state for a player to bind to,
//! and broadcasts a `PlaylistEvent` after every mutation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use podcast_proto::protocol::PodcastAudio;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioItem {
    pub id: u64,
    pub audio: PodcastAudio,
    /// Seconds into the track captured at the last pause.
    pub progress: f64,
}

/// Snapshot of the playlist.  `rev` increases on every mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlaylistState {
    pub rev: u64,
    pub playing: bool,
    pub playlist: Vec<AudioItem>,
}

impl PlaylistState {
    pub fn current(&self) -> Option<&AudioItem> {
        self.playlist.first()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaylistEvent {
    Added { id: u64 },
    Removed { id: u64 },
    /// Head was dropped by `play_next`.
    Advanced { finished: Option<u64> },
    Paused { id: u64, progress: f64 },
    Playing(bool),
}

#[derive(Clone)]
pub struct AudioPlaylist {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<PlaylistState>,
    events: broadcast::Sender<PlaylistEvent>,
}

impl AudioPlaylist {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(PlaylistState::default()),
                events,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PlaylistState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: PlaylistEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaylistEvent> {
        self.inner.events.subscribe()
    }

    pub fn state(&self) -> PlaylistState {
        self.lock().clone()
    }

    pub fn is_playing(&self) -> bool {
        self.lock().playing
    }

    pub fn len(&self) -> usize {
        self.lock().playlist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().playlist.is_empty()
    }

    pub fn in_playlist(&self, id: u64) -> bool {
        self.lock().playlist.iter().any(|item| item.id == id)
    }

    pub fn current_audio(&self) -> Option<AudioItem> {
        self.lock().playlist.first().cloned()
    }

    /// Append to the tail.  The first track into an empty playlist starts
    /// playing; otherwise the play/pause flag is left alone.  Duplicate ids
    /// are ignored.
    pub fn add(&self, id: u64, audio: PodcastAudio) -> bool {
        {
            let mut state = self.lock();
            if state.playlist.iter().any(|item| item.id == id) {
                return false;
            }

            if state.playlist.is_empty() {
                state.playing = true;
            }
            state.playlist.push(AudioItem {
                id,
                audio,
                progress: 0.0,
            });
            state.rev += 1;
            debug!(id, len = state.playlist.len(), "playlist: added");
        }
        self.emit(PlaylistEvent::Added { id });
        true
    }

    /// Drop a track wherever it sits.  Removing the head while others remain
    /// keeps playback going; emptying the list stops it.
    pub fn remove(&self, id: u64) -> bool {
        {
            let mut state = self.lock();
            let Some(pos) = state.playlist.iter().position(|item| item.id == id) else {
                return false;
            };

            state.playlist.remove(pos);
            let removed_current = pos == 0;
            state.playing = !state.playlist.is_empty() && (removed_current || state.playing);
            state.rev += 1;
        }
        self.emit(PlaylistEvent::Removed { id });
        true
    }

    pub fn play(&self) {
        let changed = {
            let mut state = self.lock();
            if state.playlist.is_empty() || state.playing {
                false
            } else {
                state.playing = true;
                state.rev += 1;
                true
            }
        };
        if changed {
            self.emit(PlaylistEvent::Playing(true));
        }
    }

    /// Stop playback and remember where the head track was.
    pub fn pause(&self, progress_secs: f64) {
        let progress = if progress_secs.is_finite() && progress_secs > 0.0 {
            progress_secs
        } else {
            0.0
        };

        let paused = {
            let mut state = self.lock();
            state.playing = false;
            state.rev += 1;
            match state.playlist.first_mut() {
                Some(head) => {
                    head.progress = progress;
                    Some(head.id)
                }
                None => None,
            }
        };

        match paused {
            Some(id) => self.emit(PlaylistEvent::Paused { id, progress }),
            None => self.emit(PlaylistEvent::Playing(false)),
        }
    }

    /// Drop the head whether it finished or was skipped.
    pub fn play_next(&self) {
        let finished = {
            let mut state = self.lock();
            let finished = if state.playlist.is_empty() {
                None
            } else {
                Some(state.playlist.remove(0).id)
            };
            state.playing = !state.playlist.is_empty();
            state.rev += 1;
            finished
        };
        self.emit(PlaylistEvent::Advanced { finished });
    }

    /// Direct override for when the media layer refuses to play.  Never
    /// marks an empty playlist as playing.
    pub fn set_playing(&self, playing: bool) {
        let changed = {
            let mut state = self.lock();
            let playing = playing && !state.playlist.is_empty();
            if state.playing == playing {
                false
            } else {
                state.playing = playing;
                state.rev += 1;
                true
            }
        };
        if changed {
            self.emit(PlaylistEvent::Playing(playing));
        }
    }
}

impl Default for AudioPlaylist {
    fn default() -> Self {
        Self::new()
    }
}

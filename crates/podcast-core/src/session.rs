//! One set of stores per application session.

use std::sync::Arc;

use podcast_proto::config::PollerConfig;

use crate::playlist::AudioPlaylist;
use crate::poller::TaskPoller;
use crate::query::TaskQuery;
use crate::stages::StageSelectionTracker;

#[derive(Clone)]
pub struct Session {
    pub playlist: AudioPlaylist,
    pub poller: TaskPoller,
    pub stages: StageSelectionTracker,
}

impl Session {
    pub fn new(config: &PollerConfig, query: Arc<dyn TaskQuery>) -> Self {
        let playlist = AudioPlaylist::new();
        let poller = TaskPoller::from_config(config, query, playlist.clone());
        Self {
            playlist,
            poller,
            stages: StageSelectionTracker::new(),
        }
    }

    /// Stop polling and forget queued jobs.  Playlist and selection are kept.
    pub fn shutdown(&self) {
        self.poller.clear_queue();
    }
}

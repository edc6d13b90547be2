//! StageSelectionTracker: stages the user picked for a merge.
//!
//! Keyed by stage id, kept in insertion order.  Re-adding a stage replaces
//! the old snapshot and moves it to the end.  Nothing expires; callers reset
//! after a successful merge.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use podcast_proto::protocol::{MergeArticleRequest, TaskStage};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionEvent {
    Added { id: u64 },
    Removed { id: u64 },
    Reset,
}

#[derive(Clone)]
pub struct StageSelectionTracker {
    inner: Arc<Inner>,
}

struct Inner {
    stages: Mutex<Vec<TaskStage>>,
    events: broadcast::Sender<SelectionEvent>,
}

impl StageSelectionTracker {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                stages: Mutex::new(Vec::new()),
                events,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TaskStage>> {
        self.inner.stages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SelectionEvent) {
        let _ = self.inner.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SelectionEvent> {
        self.inner.events.subscribe()
    }

    pub fn add_stage(&self, stage: TaskStage) {
        let id = stage.id;
        {
            let mut stages = self.lock();
            stages.retain(|s| s.id != id);
            stages.push(stage);
        }
        self.emit(SelectionEvent::Added { id });
    }

    pub fn remove_stage(&self, id: u64) -> bool {
        let removed = {
            let mut stages = self.lock();
            let before = stages.len();
            stages.retain(|s| s.id != id);
            stages.len() != before
        };
        if removed {
            self.emit(SelectionEvent::Removed { id });
        }
        removed
    }

    pub fn reset_stage(&self) {
        self.lock().clear();
        self.emit(SelectionEvent::Reset);
    }

    pub fn stages(&self) -> Vec<TaskStage> {
        self.lock().clone()
    }

    pub fn stage_ids(&self) -> Vec<u64> {
        self.lock().iter().map(|s| s.id).collect()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.lock().iter().any(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Request body for the current selection, ids in selection order.
    pub fn merge_request(
        &self,
        language: &str,
        title: &str,
        voice_ids: Option<Vec<String>>,
    ) -> MergeArticleRequest {
        MergeArticleRequest {
            language: language.to_string(),
            title: title.to_string(),
            stage_ids: self.stage_ids(),
            voice_ids: voice_ids.filter(|v| !v.is_empty()),
        }
    }
}

impl Default for StageSelectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podcast_proto::protocol::{StageName, StageStatus};

    fn stage(id: u64, output: &str) -> TaskStage {
        TaskStage {
            id,
            batch_no: format!("batch-{id}"),
            stage: StageName::Stylize,
            status: StageStatus::Completed,
            prompt: String::new(),
            output: output.to_string(),
            reason: String::new(),
            audio: None,
            task_ai: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_readd_replaces_instead_of_duplicating() {
        let tracker = StageSelectionTracker::new();
        tracker.add_stage(stage(5, "a"));
        tracker.add_stage(stage(5, "b"));

        let stages = tracker.stages();
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].id, 5);
        assert_eq!(stages[0].output, "b");
    }

    #[test]
    fn test_readd_moves_to_end() {
        let tracker = StageSelectionTracker::new();
        tracker.add_stage(stage(1, "x"));
        tracker.add_stage(stage(2, "y"));
        tracker.add_stage(stage(1, "x2"));
        assert_eq!(tracker.stage_ids(), vec![2, 1]);
    }

    #[test]
    fn test_remove_and_reset() {
        let tracker = StageSelectionTracker::new();
        tracker.add_stage(stage(1, "x"));
        tracker.add_stage(stage(2, "y"));

        assert!(tracker.remove_stage(1));
        assert!(!tracker.remove_stage(1));
        assert_eq!(tracker.stage_ids(), vec![2]);

        tracker.reset_stage();
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_merge_request_uses_selection_order() {
        let tracker = StageSelectionTracker::new();
        tracker.add_stage(stage(8, "x"));
        tracker.add_stage(stage(3, "y"));

        let req = tracker.merge_request("en", "Digest", Some(vec![]));
        assert_eq!(req.stage_ids, vec![8, 3]);
        assert_eq!(req.title, "Digest");
        assert_eq!(req.voice_ids, None);

        let req = tracker.merge_request("de", "Digest", Some(vec!["v1".to_string()]));
        assert_eq!(req.voice_ids, Some(vec!["v1".to_string()]));
    }

    #[tokio::test]
    async fn test_events() {
        let tracker = StageSelectionTracker::new();
        let mut rx = tracker.subscribe();
        tracker.add_stage(stage(4, "x"));
        tracker.remove_stage(99);
        tracker.remove_stage(4);
        tracker.reset_stage();

        assert_eq!(rx.recv().await.unwrap(), SelectionEvent::Added { id: 4 });
        assert_eq!(rx.recv().await.unwrap(), SelectionEvent::Removed { id: 4 });
        assert_eq!(rx.recv().await.unwrap(), SelectionEvent::Reset);
    }
}

//! Seams to the backend.  The stores only see these traits; `BackendClient`
//! is the HTTP implementation, tests plug in scripted ones.

use async_trait::async_trait;
use podcast_proto::protocol::{CreateTaskResult, MergeArticleRequest, PodcastTask};

use crate::error::Result;

#[async_trait]
pub trait TaskQuery: Send + Sync {
    /// Current snapshot of a job.  `Ok(None)` when the backend doesn't know
    /// it (yet); the poller treats that and `Err` alike.
    async fn get_task(&self, batch_no: &str) -> Result<Option<PodcastTask>>;
}

#[async_trait]
pub trait MergeRequester: Send + Sync {
    /// Start a merge job; the returned batch number can be polled.
    async fn merge_article(&self, request: &MergeArticleRequest) -> Result<CreateTaskResult>;
}

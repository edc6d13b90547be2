//! Submitting the current stage selection as one merge job.

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::poller::TaskPoller;
use crate::query::MergeRequester;
use crate::stages::StageSelectionTracker;

/// Send the selection to the backend, start polling the new job and clear
/// the selection.  On failure the selection is left untouched so the user
/// can retry.  Returns the new batch number.
pub async fn submit_merge(
    stages: &StageSelectionTracker,
    requester: &dyn MergeRequester,
    poller: &TaskPoller,
    language: &str,
    title: &str,
    voice_ids: Option<Vec<String>>,
) -> Result<String> {
    if stages.is_empty() {
        return Err(Error::EmptySelection);
    }
    if title.trim().is_empty() {
        return Err(Error::MissingTitle);
    }

    let request = stages.merge_request(language, title, voice_ids);
    let created = match requester.merge_article(&request).await {
        Ok(created) => created,
        Err(e) => {
            warn!("merge of {:?} failed: {}", request.stage_ids, e);
            return Err(e);
        }
    };

    info!(
        "merge of {} stage(s) started as {}",
        request.stage_ids.len(),
        created.batch_no
    );
    poller.enqueue(created.batch_no.clone());
    stages.reset_stage();
    Ok(created.batch_no)
}

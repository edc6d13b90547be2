use serde::{Deserialize, Deserializer, Serialize};

/// Envelope returned by every backend endpoint.  `code == 0` means success;
/// anything else carries a human-readable `message` and no `result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response<R> {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub message: String,
    pub result: Option<R>,
}

impl<R> Response<R> {
    pub fn ok(result: R) -> Self {
        Self {
            code: 0,
            message: String::new(),
            result: Some(result),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// Overall outcome of a podcast task.  The backend sends an empty string
/// while the pipeline is still running; that maps to `None` on the task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskResult {
    Completed,
    Failed,
}

/// One named step of the backend pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StageName {
    /// Audit the article.
    Approval,
    /// Rewrite it as a colloquial podcast article.
    Rewrite,
    /// Merge several articles into one.
    Merge,
    /// Classify the topic.
    Classify,
    /// Restyle the article.
    Stylize,
    /// Generate a podcast script.
    Scripted,
    /// Text to speech.
    Tts,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    #[default]
    Processing,
    Completed,
    Failed,
}

impl StageStatus {
    /// `completed` and `failed` never transition again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StageStatus::Processing)
    }
}

/// A podcast task (job) as returned by `/api/task/detail`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodcastTask {
    pub batch_no: String,
    #[serde(default)]
    pub title: String,
    /// News article the task was created from.  Opaque to this crate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news: Option<serde_json::Value>,
    #[serde(default)]
    pub language: String,
    #[serde(
        default,
        deserialize_with = "result_or_pending",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<TaskResult>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stages: Vec<TaskStage>,
    #[serde(default)]
    pub created_at: String,
}

impl PodcastTask {
    /// The most recent stage of the given kind.  Stages can be re-run, and
    /// later entries supersede earlier ones.
    pub fn last_stage(&self, kind: StageName) -> Option<&TaskStage> {
        self.stages.iter().rev().find(|s| s.stage == kind)
    }

    pub fn is_failed(&self) -> bool {
        self.result == Some(TaskResult::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskStage {
    pub id: u64,
    #[serde(default)]
    pub batch_no: String,
    pub stage: StageName,
    #[serde(default)]
    pub status: StageStatus,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<PodcastAudio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_ai: Option<TaskAi>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// Synthesized audio attached to a TTS stage.  Either `url` points at a
/// hosted file or `data` holds the base64-encoded bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PodcastAudio {
    #[serde(default, deserialize_with = "null_as_default")]
    pub voices: Vec<AudioVoice>,
    /// Container tag: `mp3`, `wav`, `m3u8`.
    #[serde(rename = "type", default)]
    pub audio_type: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub data: String,
    /// Length in seconds.
    #[serde(default)]
    pub duration: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub scripts: Vec<PodcastScript>,
}

impl PodcastAudio {
    /// True when there is something a player could load.
    pub fn has_source(&self) -> bool {
        !self.url.is_empty() || !self.data.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AudioVoice {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodcastScript {
    pub content: String,
    #[serde(default)]
    pub speaker: String,
    #[serde(default)]
    pub emotion: String,
    /// 0.0..=2.0, 1.0 is normal speed.
    #[serde(default = "default_speech_rate")]
    pub speech_rate: f32,
    /// 0..=100.
    #[serde(default = "default_script_volume")]
    pub volume: u8,
}

fn default_speech_rate() -> f32 {
    1.0
}

fn default_script_volume() -> u8 {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TaskAi {
    pub platform: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTaskRequest {
    pub batch_no: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub language: String,
    pub news: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskResult {
    pub batch_no: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MergeArticleRequest {
    pub language: String,
    pub title: String,
    pub stage_ids: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_ids: Option<Vec<String>>,
}

fn result_or_pending<'de, D>(deserializer: D) -> Result<Option<TaskResult>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(match raw.as_deref() {
        Some("completed") => Some(TaskResult::Completed),
        Some("failed") => Some(TaskResult::Failed),
        _ => None,
    })
}

/// The backend encodes empty lists as `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_task_has_no_result() {
        let raw = r#"{
            "batchNo": "b1",
            "title": "Morning news",
            "language": "en",
            "result": "",
            "stages": null,
            "createdAt": "2024-01-01 10:00:00"
        }"#;
        let task: PodcastTask = serde_json::from_str(raw).unwrap();
        assert_eq!(task.result, None);
        assert!(task.stages.is_empty());
        assert!(!task.is_failed());
    }

    #[test]
    fn test_last_stage_prefers_latest_rerun() {
        let raw = r#"{
            "batchNo": "b1",
            "result": "completed",
            "stages": [
                {"id": 1, "stage": "tts", "status": "failed", "audio": null},
                {"id": 2, "stage": "scripted", "status": "completed"},
                {"id": 3, "stage": "tts", "status": "completed",
                 "audio": {"voices": null, "type": "mp3", "url": "", "data": "AAAA", "duration": 12, "scripts": null}}
            ]
        }"#;
        let task: PodcastTask = serde_json::from_str(raw).unwrap();
        assert_eq!(task.result, Some(TaskResult::Completed));

        let tts = task.last_stage(StageName::Tts).unwrap();
        assert_eq!(tts.id, 3);
        assert_eq!(tts.status, StageStatus::Completed);
        let audio = tts.audio.as_ref().unwrap();
        assert_eq!(audio.audio_type, "mp3");
        assert_eq!(audio.duration, 12);
        assert!(audio.has_source());
        assert!(task.last_stage(StageName::Merge).is_none());
    }

    #[test]
    fn test_error_envelope() {
        let raw = r#"{"code": 1001, "message": "task not found", "result": null}"#;
        let resp: Response<PodcastTask> = serde_json::from_str(raw).unwrap();
        assert!(!resp.is_ok());
        assert_eq!(resp.message, "task not found");
        assert!(resp.result.is_none());
    }

    #[test]
    fn test_merge_request_wire_names() {
        let req = MergeArticleRequest {
            language: "en".to_string(),
            title: "Weekly digest".to_string(),
            stage_ids: vec![4, 9],
            voice_ids: None,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["stageIds"], serde_json::json!([4, 9]));
        assert!(value.get("voiceIds").is_none());
    }
}

//! HTTP client for the podcast backend.
//!
//! Every endpoint is a JSON `POST` under `/api/` guarded by basic auth (user
//! `token`), answering with the `{ code, message, result }` envelope.

use async_trait::async_trait;
use podcast_proto::config::RemoteConfig;
use podcast_proto::protocol::{
    CreateTaskRequest, CreateTaskResult, GetTaskRequest, MergeArticleRequest, PodcastTask,
    Response,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::query::{MergeRequester, TaskQuery};

const AUTH_USER: &str = "token";

#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    host: String,
    token: String,
}

impl BackendClient {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("podcast-core/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http,
            host: config.host.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.host, path.trim_start_matches('/'))
    }

    async fn post<P, R>(&self, path: &str, params: &P) -> Result<Option<R>>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        debug!("POST {}", url);

        let mut request = self.http.post(&url).json(params);
        if !self.token.is_empty() {
            request = request.basic_auth(AUTH_USER, Some(&self.token));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status(status.as_u16()));
        }

        let envelope: Response<R> = response.json().await?;
        if !envelope.is_ok() {
            return Err(Error::Api {
                code: envelope.code,
                message: envelope.message,
            });
        }
        Ok(envelope.result)
    }

    pub async fn get_task(&self, batch_no: &str) -> Result<Option<PodcastTask>> {
        let request = GetTaskRequest {
            batch_no: batch_no.to_string(),
        };
        self.post("task/detail", &request).await
    }

    /// Start a podcast task for a news article.
    pub async fn create_task(
        &self,
        language: &str,
        news: serde_json::Value,
        voice_ids: Option<Vec<String>>,
    ) -> Result<CreateTaskResult> {
        let request = CreateTaskRequest {
            language: language.to_string(),
            news,
            voice_ids,
        };
        self.post("task/create", &request)
            .await?
            .ok_or(Error::MissingResult("task/create"))
    }

    pub async fn merge_article(&self, request: &MergeArticleRequest) -> Result<CreateTaskResult> {
        self.post("task/merge", request)
            .await?
            .ok_or(Error::MissingResult("task/merge"))
    }
}

#[async_trait]
impl TaskQuery for BackendClient {
    async fn get_task(&self, batch_no: &str) -> Result<Option<PodcastTask>> {
        BackendClient::get_task(self, batch_no).await
    }
}

#[async_trait]
impl MergeRequester for BackendClient {
    async fn merge_article(&self, request: &MergeArticleRequest) -> Result<CreateTaskResult> {
        BackendClient::merge_article(self, request).await
    }
}

use podcast_core::client::BackendClient;
use podcast_core::{Error, TaskQuery};
use podcast_proto::config::RemoteConfig;
use podcast_proto::protocol::{MergeArticleRequest, StageName, StageStatus, TaskResult};
use serde_json::json;
use wiremock::matchers::{body_json, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, token: &str) -> BackendClient {
    BackendClient::new(&RemoteConfig {
        host: format!("{}/", server.uri()),
        token: token.to_string(),
        timeout_secs: 5,
    })
    .unwrap()
}

#[tokio::test]
async fn get_task_decodes_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/task/detail"))
        .and(body_json(json!({ "batchNo": "b1" })))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "message": "",
            "result": {
                "batchNo": "b1",
                "title": "Morning news",
                "language": "en",
                "result": "completed",
                "stages": [
                    {"id": 3, "batchNo": "b1", "stage": "scripted", "status": "completed"},
                    {"id": 4, "batchNo": "b1", "stage": "tts", "status": "completed",
                     "audio": {"voices": [{"id": "v1", "name": "Ava"}], "type": "wav",
                               "url": "", "data": "UklG", "duration": 95, "scripts": null}}
                ],
                "createdAt": "2024-05-01 08:00:00"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, "secret");
    let task = TaskQuery::get_task(&client, "b1").await.unwrap().unwrap();

    assert_eq!(task.result, Some(TaskResult::Completed));
    let tts = task.last_stage(StageName::Tts).unwrap();
    assert_eq!(tts.status, StageStatus::Completed);
    assert_eq!(tts.audio.as_ref().unwrap().voices[0].name, "Ava");
}

#[tokio::test]
async fn missing_task_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/task/detail"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "message": "" })),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, "");
    assert!(client.get_task("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn non_zero_code_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/task/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 1001,
            "message": "record not found",
            "result": null
        })))
        .mount(&server)
        .await;

    let err = client_for(&server, "").get_task("b1").await.unwrap_err();
    match err {
        Error::Api { code, message } => {
            assert_eq!(code, 1001);
            assert_eq!(message, "record not found");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn http_failure_is_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/task/detail"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client_for(&server, "wrong").get_task("b1").await.unwrap_err();
    assert!(matches!(err, Error::Status(401)));
}

#[tokio::test]
async fn merge_returns_new_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/task/merge"))
        .and(body_json(json!({
            "language": "en",
            "title": "Weekly digest",
            "stageIds": [4, 9],
            "voiceIds": ["v1"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "message": "",
            "result": { "batchNo": "m-77" }
        })))
        .mount(&server)
        .await;

    let request = MergeArticleRequest {
        language: "en".to_string(),
        title: "Weekly digest".to_string(),
        stage_ids: vec![4, 9],
        voice_ids: Some(vec!["v1".to_string()]),
    };
    let created = client_for(&server, "").merge_article(&request).await.unwrap();
    assert_eq!(created.batch_no, "m-77");
}

#[tokio::test]
async fn create_without_result_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/task/create"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "result": null })),
        )
        .mount(&server)
        .await;

    let err = client_for(&server, "")
        .create_task("en", json!({ "title": "Headline" }), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingResult("task/create")));
}

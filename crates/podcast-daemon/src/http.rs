use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use podcast_core::merge::submit_merge;
use podcast_core::source::{audio_src, format_remaining};
use podcast_core::{Error, MergeRequester, QueueItem, Session};
use podcast_proto::protocol::{CreateTaskResult, TaskStage};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct HttpState {
    pub session: Session,
    pub merger: Arc<dyn MergeRequester>,
    pub language: String,
}

#[derive(Serialize)]
struct PlaylistView {
    rev: u64,
    playing: bool,
    items: Vec<PlaylistEntry>,
}

#[derive(Serialize)]
struct PlaylistEntry {
    id: u64,
    src: String,
    duration: u32,
    progress: f64,
    remaining: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MergeBody {
    title: String,
    #[serde(default)]
    voice_ids: Option<Vec<String>>,
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/api/playlist", get(get_playlist))
        .route("/api/playlist/play", post(play))
        .route("/api/playlist/pause/:secs", post(pause))
        .route("/api/playlist/next", post(play_next))
        .route("/api/playlist/items/:id", delete(remove_audio))
        .route("/api/queue", get(get_queue))
        .route("/api/queue/:batch_no", post(enqueue).delete(dequeue))
        .route(
            "/api/stages",
            get(get_stages).post(add_stage).delete(reset_stages),
        )
        .route("/api/stages/:id", delete(remove_stage))
        .route("/api/merge", post(merge))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub fn start_server(
    bind_address: String,
    port: u16,
    state: HttpState,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(state);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

fn found(hit: bool) -> StatusCode {
    if hit {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

// ── Playlist ──────────────────────────────────────────────────────────────────

async fn get_playlist(State(state): State<HttpState>) -> Json<PlaylistView> {
    let snapshot = state.session.playlist.state();
    let items = snapshot
        .playlist
        .iter()
        .map(|item| PlaylistEntry {
            id: item.id,
            src: audio_src(&item.audio),
            duration: item.audio.duration,
            progress: item.progress,
            remaining: format_remaining(f64::from(item.audio.duration), item.progress),
        })
        .collect();

    Json(PlaylistView {
        rev: snapshot.rev,
        playing: snapshot.playing,
        items,
    })
}

async fn play(State(state): State<HttpState>) -> StatusCode {
    state.session.playlist.play();
    StatusCode::OK
}

async fn pause(State(state): State<HttpState>, Path(secs): Path<f64>) -> StatusCode {
    state.session.playlist.pause(secs);
    StatusCode::OK
}

async fn play_next(State(state): State<HttpState>) -> StatusCode {
    state.session.playlist.play_next();
    StatusCode::OK
}

async fn remove_audio(State(state): State<HttpState>, Path(id): Path<u64>) -> StatusCode {
    found(state.session.playlist.remove(id))
}

// ── Poll queue ────────────────────────────────────────────────────────────────

async fn get_queue(State(state): State<HttpState>) -> Json<Vec<QueueItem>> {
    Json(state.session.poller.items())
}

async fn enqueue(State(state): State<HttpState>, Path(batch_no): Path<String>) -> StatusCode {
    info!("HTTP API: watch {}", batch_no);
    if state.session.poller.enqueue(batch_no) {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}

async fn dequeue(State(state): State<HttpState>, Path(batch_no): Path<String>) -> StatusCode {
    found(state.session.poller.remove_from_queue(&batch_no))
}

// ── Stage selection ───────────────────────────────────────────────────────────

async fn get_stages(State(state): State<HttpState>) -> Json<Vec<TaskStage>> {
    Json(state.session.stages.stages())
}

async fn add_stage(State(state): State<HttpState>, Json(stage): Json<TaskStage>) -> StatusCode {
    state.session.stages.add_stage(stage);
    StatusCode::OK
}

async fn remove_stage(State(state): State<HttpState>, Path(id): Path<u64>) -> StatusCode {
    found(state.session.stages.remove_stage(id))
}

async fn reset_stages(State(state): State<HttpState>) -> StatusCode {
    state.session.stages.reset_stage();
    StatusCode::OK
}

async fn merge(
    State(state): State<HttpState>,
    Json(body): Json<MergeBody>,
) -> Result<Json<CreateTaskResult>, StatusCode> {
    let result = submit_merge(
        &state.session.stages,
        state.merger.as_ref(),
        &state.session.poller,
        &state.language,
        &body.title,
        body.voice_ids,
    )
    .await;

    match result {
        Ok(batch_no) => Ok(Json(CreateTaskResult { batch_no })),
        Err(Error::EmptySelection | Error::MissingTitle) => Err(StatusCode::BAD_REQUEST),
        Err(e) => {
            warn!("HTTP API: merge failed: {}", e);
            Err(StatusCode::BAD_GATEWAY)
        }
    }
}

//! OAuth consent and YouTube API routes
//!
//! Every YouTube route asks the credential store for a usable credential
//! first, then makes its upstream call(s). Failures are logged in full and
//! answered with the route's static message.

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::LOCATION;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use google_auth::Credential;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};
use youtube::{CommentOrder, MAX_COMMENT_THREADS};

use crate::AppState;
use crate::error::{ApiFailure, GatewayError};
use crate::metrics;

const TOKENS_RECEIVED: &str = "Tokens received — check your terminal and save them to .env.";
const TOKEN_EXCHANGE_FAILED: &str = "Error retrieving access token.";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/google", get(begin_consent))
        .route("/oauth2callback", get(oauth_callback))
        .route("/api/youtube/video/{id}", get(get_video).put(update_video))
        .route("/api/youtube/comments/{video_id}", get(list_comments))
        .route("/api/youtube/video/{id}/comment", post(add_comment))
        .route("/api/youtube/comment/{id}/reply", post(reply_to_comment))
        .route("/api/youtube/comment/{id}", delete(delete_comment))
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    #[serde(default)]
    code: String,
}

#[derive(Debug, Default, Deserialize)]
struct VideoEdit {
    title: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CommentBody {
    #[serde(default)]
    text: String,
}

/// Send the account owner to Google's consent screen.
async fn begin_consent(State(state): State<AppState>) -> Response {
    (StatusCode::FOUND, [(LOCATION, state.consent_url.as_str())]).into_response()
}

/// Complete the consent flow: exchange the code and install the credential.
///
/// Nothing persists the tokens; they are printed so the operator can copy
/// them into the environment for the next start.
async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let granted = match state.credentials.exchange_code_for_tokens(&params.code).await {
        Ok(granted) => granted,
        Err(e) => {
            error!(error = %e, "authorization code exchange failed");
            metrics::record_upstream_error("auth");
            state.audit.error(
                "Error getting tokens",
                json!({ "error": e.to_string(), "status": e.status() }),
            );
            return (StatusCode::INTERNAL_SERVER_ERROR, TOKEN_EXCHANGE_FAILED).into_response();
        }
    };

    let refresh_issued = granted.has_refresh_token();
    let previous = state.credentials.current().await;
    let credential = granted.carry_refresh_from(&previous);
    state.credentials.apply(credential.clone()).await;

    info!(
        access_token = %credential.access_token,
        refresh_token = %credential.refresh_token,
        expiry = credential.expiry,
        "tokens received, save them as ACCESS_TOKEN and REFRESH_TOKEN"
    );
    state.audit.info(
        "Tokens received",
        json!({
            "scope": credential.scope,
            "expiry": credential.expiry,
            "refreshTokenIssued": refresh_issued,
        }),
    );
    if !credential.has_refresh_token() {
        warn!("consent completed without a refresh token; access ends at expiry");
        state.audit.warn(
            "Consent completed without a refresh token",
            json!({ "expiry": credential.expiry }),
        );
    }

    (StatusCode::OK, TOKENS_RECEIVED).into_response()
}

async fn get_video(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match fetch_video(&state, &id).await {
        Ok(video) => {
            state.audit.info("Video details fetched", json!({ "videoId": id }));
            Json(video).into_response()
        }
        Err(e) => failure(&state, "Failed to fetch video details", e, json!({ "videoId": id })),
    }
}

async fn fetch_video(state: &AppState, id: &str) -> Result<Value, GatewayError> {
    let credential = authorized(state).await?;
    state
        .youtube
        .get_video(&credential, id)
        .await?
        .ok_or(GatewayError::VideoNotFound)
}

async fn update_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<VideoEdit>>,
) -> Response {
    let edit = body.map(|Json(edit)| edit).unwrap_or_default();
    match edit_video(&state, &id, &edit).await {
        Ok(data) => {
            state.audit.info("Video updated", json!({ "videoId": id }));
            Json(json!({ "message": "Video updated successfully", "data": data })).into_response()
        }
        Err(e) => failure(&state, "Failed to update video", e, json!({ "videoId": id })),
    }
}

/// Fetch the current snippet, apply the non-empty edits, write it back.
async fn edit_video(state: &AppState, id: &str, edit: &VideoEdit) -> Result<Value, GatewayError> {
    let credential = authorized(state).await?;
    let current = state
        .youtube
        .get_video_snippet(&credential, id)
        .await?
        .ok_or_else(|| GatewayError::MissingVideo(id.to_string()))?;
    let snippet = current.with_edits(edit.title.as_deref(), edit.description.as_deref());
    Ok(state
        .youtube
        .update_video_snippet(&credential, id, &snippet)
        .await?)
}

async fn list_comments(State(state): State<AppState>, Path(video_id): Path<String>) -> Response {
    match fetch_comments(&state, &video_id).await {
        Ok(threads) => {
            state.audit.info(
                "Comments fetched",
                json!({ "videoId": video_id, "count": threads.len() }),
            );
            Json(threads).into_response()
        }
        Err(e) => failure(&state, "Failed to fetch comments", e, json!({ "videoId": video_id })),
    }
}

async fn fetch_comments(state: &AppState, video_id: &str) -> Result<Vec<Value>, GatewayError> {
    let credential = authorized(state).await?;
    Ok(state
        .youtube
        .list_comment_threads(
            &credential,
            video_id,
            MAX_COMMENT_THREADS,
            CommentOrder::Relevance,
        )
        .await?)
}

async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<CommentBody>>,
) -> Response {
    let text = body.map(|Json(b)| b.text).unwrap_or_default();
    match post_comment(&state, &id, &text).await {
        Ok(comment) => {
            state.audit.info("Comment added", json!({ "videoId": id }));
            Json(json!({ "message": "Comment added", "comment": comment })).into_response()
        }
        Err(e) => failure(&state, "Failed to add comment", e, json!({ "videoId": id })),
    }
}

async fn post_comment(state: &AppState, video_id: &str, text: &str) -> Result<Value, GatewayError> {
    let credential = authorized(state).await?;
    Ok(state
        .youtube
        .insert_comment_thread(&credential, video_id, text)
        .await?)
}

async fn reply_to_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<CommentBody>>,
) -> Response {
    let text = body.map(|Json(b)| b.text).unwrap_or_default();
    match post_reply(&state, &id, &text).await {
        Ok(reply) => {
            state.audit.info("Reply posted", json!({ "commentId": id }));
            Json(json!({ "message": "Reply posted", "reply": reply })).into_response()
        }
        Err(e) => failure(&state, "Failed to reply", e, json!({ "commentId": id })),
    }
}

async fn post_reply(state: &AppState, parent_id: &str, text: &str) -> Result<Value, GatewayError> {
    let credential = authorized(state).await?;
    Ok(state.youtube.insert_reply(&credential, parent_id, text).await?)
}

async fn delete_comment(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match remove_comment(&state, &id).await {
        Ok(()) => {
            state.audit.info("Comment deleted", json!({ "commentId": id }));
            Json(json!({ "message": "Comment deleted successfully" })).into_response()
        }
        Err(e) => failure(&state, "Failed to delete comment", e, json!({ "commentId": id })),
    }
}

async fn remove_comment(state: &AppState, comment_id: &str) -> Result<(), GatewayError> {
    let credential = authorized(state).await?;
    Ok(state.youtube.delete_comment(&credential, comment_id).await?)
}

async fn authorized(state: &AppState) -> Result<Credential, GatewayError> {
    Ok(state.credentials.authorized().await?)
}

/// Log, count and audit a failed operation, then answer with its message.
fn failure(state: &AppState, message: &'static str, e: GatewayError, context: Value) -> Response {
    if matches!(e, GatewayError::VideoNotFound) {
        debug!(context = %context, "video not found");
    } else {
        error!(error = %e, kind = e.kind(), context = %context, "{message}");
        metrics::record_upstream_error(e.kind());
        let mut metadata = context;
        if let Value::Object(fields) = &mut metadata {
            fields.insert("error".into(), Value::String(e.to_string()));
        }
        state.audit.error(message, metadata);
    }
    ApiFailure::from_error(message, &e).into_response()
}

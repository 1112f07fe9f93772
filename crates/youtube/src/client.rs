//! HTTP client for the YouTube Data API v3
//!
//! One method per upstream call. Each method issues exactly one request,
//! never retries, and maps non-2xx answers to `Error::Api` using Google's
//! error envelope when present.

use google_auth::Credential;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::types::{
    CommentOrder, ErrorEnvelope, ListResponse, VIDEO_PARTS, VideoSnippet,
};

/// Production API root.
pub const API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Client for the delegated channel's videos and comments.
#[derive(Clone)]
pub struct YouTubeClient {
    http: reqwest::Client,
    api_base_url: String,
}

impl YouTubeClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_base_url(http, API_BASE_URL)
    }

    pub fn with_base_url(http: reqwest::Client, api_base_url: impl Into<String>) -> Self {
        Self {
            http,
            api_base_url: api_base_url.into(),
        }
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/{resource}", self.api_base_url.trim_end_matches('/'))
    }

    /// Full video resource (snippet, statistics, contentDetails, status).
    ///
    /// `None` when the API lists no item for `video_id`.
    #[instrument(skip(self, credential))]
    pub async fn get_video(&self, credential: &Credential, video_id: &str) -> Result<Option<Value>> {
        let request = self
            .http
            .get(self.url("videos"))
            .bearer_auth(&credential.access_token)
            .query(&[("part", VIDEO_PARTS), ("id", video_id)]);

        let list: ListResponse<Value> = self.send(request).await?;
        Ok(list.items.into_iter().next())
    }

    /// Snippet of a video, for read-modify-write updates.
    #[instrument(skip(self, credential))]
    pub async fn get_video_snippet(
        &self,
        credential: &Credential,
        video_id: &str,
    ) -> Result<Option<VideoSnippet>> {
        #[derive(serde::Deserialize)]
        struct SnippetOnly {
            snippet: VideoSnippet,
        }

        let request = self
            .http
            .get(self.url("videos"))
            .bearer_auth(&credential.access_token)
            .query(&[("part", "snippet"), ("id", video_id)]);

        let list: ListResponse<SnippetOnly> = self.send(request).await?;
        Ok(list.items.into_iter().next().map(|item| item.snippet))
    }

    /// Replace a video's snippet. Returns the updated video resource.
    #[instrument(skip(self, credential, snippet))]
    pub async fn update_video_snippet(
        &self,
        credential: &Credential,
        video_id: &str,
        snippet: &VideoSnippet,
    ) -> Result<Value> {
        let request = self
            .http
            .put(self.url("videos"))
            .bearer_auth(&credential.access_token)
            .query(&[("part", "snippet")])
            .json(&json!({
                "id": video_id,
                "snippet": snippet,
            }));

        self.send(request).await
    }

    /// Top-level comment threads of a video, at most `max_results` of them.
    #[instrument(skip(self, credential))]
    pub async fn list_comment_threads(
        &self,
        credential: &Credential,
        video_id: &str,
        max_results: u32,
        order: CommentOrder,
    ) -> Result<Vec<Value>> {
        let max = max_results.to_string();
        let request = self
            .http
            .get(self.url("commentThreads"))
            .bearer_auth(&credential.access_token)
            .query(&[
                ("part", "snippet"),
                ("videoId", video_id),
                ("maxResults", max.as_str()),
                ("order", order.as_str()),
            ]);

        let list: ListResponse<Value> = self.send(request).await?;
        let mut items = list.items;
        items.truncate(max_results as usize);
        Ok(items)
    }

    /// Post a new top-level comment on a video.
    #[instrument(skip(self, credential, text))]
    pub async fn insert_comment_thread(
        &self,
        credential: &Credential,
        video_id: &str,
        text: &str,
    ) -> Result<Value> {
        let request = self
            .http
            .post(self.url("commentThreads"))
            .bearer_auth(&credential.access_token)
            .query(&[("part", "snippet")])
            .json(&json!({
                "snippet": {
                    "videoId": video_id,
                    "topLevelComment": {
                        "snippet": { "textOriginal": text }
                    }
                }
            }));

        self.send(request).await
    }

    /// Reply to an existing comment.
    #[instrument(skip(self, credential, text))]
    pub async fn insert_reply(
        &self,
        credential: &Credential,
        parent_id: &str,
        text: &str,
    ) -> Result<Value> {
        let request = self
            .http
            .post(self.url("comments"))
            .bearer_auth(&credential.access_token)
            .query(&[("part", "snippet")])
            .json(&json!({
                "snippet": {
                    "parentId": parent_id,
                    "textOriginal": text,
                }
            }));

        self.send(request).await
    }

    #[instrument(skip(self, credential))]
    pub async fn delete_comment(&self, credential: &Credential, comment_id: &str) -> Result<()> {
        let request = self
            .http
            .delete(self.url("comments"))
            .bearer_auth(&credential.access_token)
            .query(&[("id", comment_id)]);

        self.execute(request).await.map(drop)
    }

    /// Send and decode a JSON success body.
    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        self.execute(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| Error::Decode(e.to_string()))
    }

    /// Send and turn any non-2xx answer into `Error::Api`.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        debug!(%status, "YouTube API responded");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) if !envelope.error.message.is_empty() => envelope.error.message,
            _ => body,
        };
        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }
}

//! YouTube Data API v3 client
//!
//! The handful of upstream calls the gateway forwards: video lookup and
//! snippet update, comment thread listing and insertion, replies and
//! deletion. Every call authenticates with the bearer token of a
//! `google_auth::Credential` obtained from the credential store.

pub mod client;
pub mod error;
pub mod types;

pub use client::{API_BASE_URL, YouTubeClient};
pub use error::{Error, Result};
pub use types::{CommentOrder, MAX_COMMENT_THREADS, VIDEO_PARTS, VideoSnippet};

//! Resource shapes the gateway needs to look inside
//!
//! Everything else is forwarded as `serde_json::Value` untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parts requested for a video lookup.
pub const VIDEO_PARTS: &str = "snippet,statistics,contentDetails,status";

/// Upper bound on comment threads returned by one listing.
pub const MAX_COMMENT_THREADS: u32 = 20;

/// Video snippet with the editable fields typed.
///
/// `videos.update` replaces the whole snippet, so every field the API
/// returned (categoryId, tags, defaultLanguage, ...) is kept in `rest` and
/// written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSnippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl VideoSnippet {
    /// Apply a partial edit. Absent or empty values keep the current text.
    pub fn with_edits(mut self, title: Option<&str>, description: Option<&str>) -> Self {
        if let Some(title) = title.filter(|t| !t.is_empty()) {
            self.title = title.to_string();
        }
        if let Some(description) = description.filter(|d| !d.is_empty()) {
            self.description = description.to_string();
        }
        self
    }
}

/// Sort order for comment thread listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentOrder {
    #[default]
    Relevance,
    Time,
}

impl CommentOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentOrder::Relevance => "relevance",
            CommentOrder::Time => "time",
        }
    }
}

/// `*.list` response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// Google API error envelope: `{"error":{"code":..,"message":..}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snippet() -> VideoSnippet {
        serde_json::from_value(serde_json::json!({
            "title": "Original title",
            "description": "Original description",
            "categoryId": "22",
            "tags": ["rust", "oauth"],
        }))
        .unwrap()
    }

    #[test]
    fn title_only_edit_preserves_description_verbatim() {
        let edited = snippet().with_edits(Some("New title"), None);
        assert_eq!(edited.title, "New title");
        assert_eq!(edited.description, "Original description");
    }

    #[test]
    fn empty_edits_keep_existing_values() {
        let edited = snippet().with_edits(Some(""), Some(""));
        assert_eq!(edited, snippet());
    }

    #[test]
    fn unknown_snippet_fields_survive_round_trip() {
        let json = serde_json::to_value(snippet().with_edits(None, Some("d2"))).unwrap();
        assert_eq!(json["categoryId"], "22");
        assert_eq!(json["tags"][1], "oauth");
        assert_eq!(json["description"], "d2");
    }

    #[test]
    fn comment_order_uses_api_spelling() {
        assert_eq!(CommentOrder::default().as_str(), "relevance");
        assert_eq!(
            serde_json::to_string(&CommentOrder::Time).unwrap(),
            "\"time\""
        );
    }
}

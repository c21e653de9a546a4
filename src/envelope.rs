//! JSON envelope returned by TGStat's AJAX endpoints.
//!
//! Both the channel search and the "load more posts" endpoints answer with
//! the same wrapper: a status flag, an embedded HTML fragment, and
//! continuation hints for the next request. The envelope is transient: the
//! pagination driver unwraps it, applies the hints, and discards it.

use serde::Deserialize;

/// Continuation cursor as it appears in an envelope.
///
/// The search endpoint reports the next page index as a number; the post
/// feed reports the next cursor as a post id, which has been observed both
/// as a JSON number and as a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PageCursor {
    Number(i64),
    Text(String),
}

impl PageCursor {
    /// Numeric value of the cursor, if it has one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PageCursor::Number(n) => Some(*n),
            PageCursor::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Deserialized AJAX response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct PageEnvelope {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(rename = "hasMore", default)]
    pub has_more: bool,
    #[serde(rename = "nextPage", default)]
    pub next_page: Option<PageCursor>,
    #[serde(rename = "nextOffset", default)]
    pub next_offset: Option<i64>,
}

impl PageEnvelope {
    pub fn status_ok(&self) -> bool {
        self.status == "ok"
    }

    /// The embedded HTML fragment, or an empty string when absent.
    pub fn html_fragment(&self) -> &str {
        self.html.as_deref().unwrap_or("")
    }

    /// Numeric continuation cursor, if the envelope carried a usable one.
    pub fn next_page_id(&self) -> Option<i64> {
        self.next_page.as_ref().and_then(PageCursor::as_i64)
    }
}

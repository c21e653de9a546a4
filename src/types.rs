//! Record and configuration types exposed to callers.

use serde::Serialize;
use std::time::Duration;

/// Sentinel stored in the `*_raw` companion fields when the source text for
/// a value could not be located at all.
pub const NOT_AVAILABLE: &str = "N/A";

/// Channel metadata extracted from one search-result card.
///
/// Numeric statistics are best effort: `None` means the raw text was present
/// but unparsable (or absent), while the `*_raw` companion keeps whatever
/// the card displayed so callers can make their own call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelRecord {
    /// Absolute URL of the channel's statistics page on TGStat.
    pub tgstat_url: String,
    /// Handle or numeric id pulled out of the stat-page link.
    pub username: Option<String>,
    pub title: String,
    pub avatar_url: Option<String>,
    pub subscribers: Option<i64>,
    pub subscribers_raw: String,
    pub avg_reach: Option<i64>,
    pub avg_reach_raw: String,
    pub ci_index: Option<i64>,
    pub ci_index_raw: String,
    pub category: String,
}

/// One post extracted from a channel feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    /// Numeric post id, also the pagination cursor unit. Within one feed the
    /// ids are expected to be non-increasing as pages advance.
    pub id: Option<i64>,
    /// Display timestamp as rendered by the site, not normalized.
    pub datetime_raw: String,
    pub text: String,
    pub has_photo: bool,
    pub has_video: bool,
    pub has_document: bool,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub views: Option<i64>,
    pub views_raw: String,
    pub shares: Option<i64>,
    pub shares_raw: String,
    pub forwards: Option<i64>,
    pub forwards_raw: String,
    pub tgstat_post_url: Option<String>,
    pub telegram_post_url: Option<String>,
}

/// Sort order accepted by the channel search endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SearchSort {
    /// By subscriber count (the site default).
    #[default]
    Participants,
    /// By average post reach.
    AvgReach,
    /// By citation index.
    CiIndex,
}

impl SearchSort {
    /// Wire value sent in the `sort` form field.
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchSort::Participants => "participants",
            SearchSort::AvgReach => "avg_reach",
            SearchSort::CiIndex => "ci_index",
        }
    }
}

/// Caller-supplied parameters for a channel search run.
#[derive(Debug, Clone)]
pub struct ChannelSearchParams {
    pub query: String,
    pub sort: SearchSort,
    /// Page budget: the search stops after this many result pages even if
    /// the endpoint reports more.
    pub max_pages: usize,
    /// Country filter id; the endpoint encodes it as `countries[<id>]=<id>`.
    pub country_id: u32,
}

impl ChannelSearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            sort: SearchSort::default(),
            max_pages: 1,
            country_id: 1,
        }
    }

    pub fn with_sort(mut self, sort: SearchSort) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_country(mut self, country_id: u32) -> Self {
        self.country_id = country_id;
        self
    }
}

/// Tunables for request pacing.
///
/// The delay ranges are anti-throttling heuristics, not correctness
/// requirements, so they are configurable rather than hard-coded. Tests set
/// them to zero.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Seconds slept between search result pages (min, max).
    pub search_delay: (f64, f64),
    /// Seconds slept before each "load more posts" request (min, max).
    pub feed_delay: (f64, f64),
    /// Upper bound on any single transport round trip.
    pub request_timeout: Duration,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            search_delay: (1.5, 3.0),
            feed_delay: (2.0, 4.0),
            request_timeout: Duration::from_secs(20),
        }
    }
}

impl ScrapeConfig {
    /// Configuration with no inter-request sleeping, for tests.
    pub fn without_delays() -> Self {
        Self {
            search_delay: (0.0, 0.0),
            feed_delay: (0.0, 0.0),
            ..Self::default()
        }
    }
}

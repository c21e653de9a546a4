//! HTML extraction for TGStat fragments.
//!
//! This module turns the server-rendered markup embedded in AJAX envelopes
//! (and full channel pages) into typed records. TGStat's markup is not
//! contractually stable, so every extraction step is an ordered chain of
//! increasingly permissive fallbacks: a missing optional field degrades to a
//! sentinel, a card missing its mandatory anchor is skipped with a
//! diagnostic, and nothing in here ever fails a whole batch.

use crate::numbers::parse_magnitude;
use crate::types::{ChannelRecord, PostRecord, NOT_AVAILABLE};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Extractor for channel search-result cards and post-feed cards.
///
/// Stateless apart from the base URL used to absolutize relative links.
#[derive(Debug, Clone)]
pub struct TgStatParser {
    base_url: String,
}

impl TgStatParser {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Extract channel records from a search-result fragment.
    ///
    /// Cards without a stat-page link are skipped, never fatal to the batch.
    pub fn parse_channel_cards(&self, html: &str) -> Vec<ChannelRecord> {
        let document = Html::parse_document(html);
        let cards = collect_cards(&document, "div#channels-list-holder", "peer-item-row");
        log::debug!("found {} potential channel cards", cards.len());

        let stat_link_re = Regex::new(r"/channel/(@\w+|[\w-]+)/stat").unwrap();
        let mut records = Vec::new();
        for card in cards {
            match self.parse_channel_card(card, &stat_link_re) {
                Some(record) => records.push(record),
                None => log::warn!("skipping channel card without a stat-page link"),
            }
        }
        records
    }

    /// Extract post records from a channel page or a load-more fragment.
    ///
    /// Cards without a `post-<digits>` id attribute are skipped.
    pub fn parse_post_cards(&self, html: &str) -> Vec<PostRecord> {
        let document = Html::parse_document(html);
        let cards = collect_cards(&document, "div.posts-list", "post-container");
        log::debug!("found {} potential post cards", cards.len());

        let post_id_re = Regex::new(r"post-(\d+)").unwrap();
        let telegram_re =
            Regex::new(r"https://t(?:elegram)?\.(?:me|org)/|https://ttttt\.me/").unwrap();
        let mut records = Vec::new();
        for card in cards {
            match self.parse_post_card(card, &post_id_re, &telegram_re) {
                Some(record) => records.push(record),
                None => log::warn!("skipping post card without a post-<id> anchor"),
            }
        }
        records
    }

    fn parse_channel_card(&self, card: ElementRef, stat_link_re: &Regex) -> Option<ChannelRecord> {
        let (tgstat_url, username) = self.stat_link(card, stat_link_re)?;

        let title = select_text(card, "div.text-truncate.font-16.text-dark.mt-n1")
            .unwrap_or_else(|| {
                log::warn!(
                    "no title element for {}, check the title selector",
                    username.as_deref().unwrap_or(NOT_AVAILABLE)
                );
                NOT_AVAILABLE.to_string()
            });

        let avatar_url = select_attr(card, "img.img-thumbnail", "src")
            .map(|src| normalize_protocol_relative(&src));

        let mut stats = self.stats_columns(card);
        if stats.subscribers.is_none() {
            // Secondary heuristic for layouts without the three-column block.
            if let Some((raw, parsed)) = self.leading_magnitude(card) {
                stats.subscribers_raw = raw;
                stats.subscribers = parsed;
            }
        }

        let category = select_text(card, "span.border.rounded.bg-light.px-1")
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());

        Some(ChannelRecord {
            tgstat_url,
            username,
            title,
            avatar_url,
            subscribers: stats.subscribers,
            subscribers_raw: stats.subscribers_raw,
            avg_reach: stats.avg_reach,
            avg_reach_raw: stats.avg_reach_raw,
            ci_index: stats.ci_index,
            ci_index_raw: stats.ci_index_raw,
            category,
        })
    }

    /// Locate the stat-page link, yielding the canonical URL and the handle.
    fn stat_link(&self, card: ElementRef, stat_link_re: &Regex) -> Option<(String, Option<String>)> {
        let anchor_selector = Selector::parse("a[href]").unwrap();
        for anchor in card.select(&anchor_selector) {
            let href = anchor.value().attr("href").unwrap_or("");
            if let Some(captures) = stat_link_re.captures(href) {
                let username = captures.get(1).map(|m| m.as_str().to_string());
                return Some((self.absolutize(href), username));
            }
        }
        None
    }

    /// The fixed three-column statistics block: subscribers, average reach,
    /// citation index. Each column is independently optional so one missing
    /// stat does not drop the other two.
    fn stats_columns(&self, card: ElementRef) -> StatsColumns {
        let mut stats = StatsColumns::default();

        let block_selector = Selector::parse(".col.col-12.col-sm-7").unwrap();
        let Some(block) = card.select(&block_selector).next() else {
            return stats;
        };

        let column_selector = Selector::parse(".col.col-4.pt-1").unwrap();
        let columns: Vec<_> = block.select(&column_selector).collect();
        if columns.len() != 3 {
            log::warn!("expected 3 stats columns, found {}", columns.len());
            return stats;
        }

        if let Some(text) = select_text(columns[0], "h4") {
            stats.subscribers_raw = text.replace(' ', "");
            stats.subscribers = parse_magnitude(&stats.subscribers_raw);
        }
        if let Some(text) = select_text(columns[1], "h4") {
            stats.avg_reach = parse_magnitude(&text);
            stats.avg_reach_raw = text;
        }
        if let Some(text) = select_text(columns[2], "h4") {
            stats.ci_index_raw = text.replace(' ', "");
            stats.ci_index = parse_magnitude(&stats.ci_index_raw);
        }
        stats
    }

    /// Scan the compact card layout for a leading digits-with-suffix token.
    fn leading_magnitude(&self, card: ElementRef) -> Option<(String, Option<i64>)> {
        let text = select_text(card, "div.text-truncate.font-14.text-dark")?;
        let leading_re = Regex::new(r"\d[\d\s,.]*[km]?").unwrap();
        let token = leading_re.find(&text)?.as_str().replace(' ', "");
        let parsed = parse_magnitude(&token);
        Some((token, parsed))
    }

    fn parse_post_card(
        &self,
        card: ElementRef,
        post_id_re: &Regex,
        telegram_re: &Regex,
    ) -> Option<PostRecord> {
        let id = card
            .value()
            .id()
            .and_then(|id| post_id_re.captures(id))
            .and_then(|captures| captures.get(1))
            .and_then(|digits| digits.as_str().parse::<i64>().ok())?;

        let datetime_raw = select_text(card, "div.post-header small")
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());

        let body_selector = Selector::parse("div.post-body").unwrap();
        let body = card.select(&body_selector).next();

        let (text, has_photo, has_video, has_document, image_url, video_url) = match body {
            Some(body) => (
                post_text(body),
                has_descendant(body, "div.post-img") || has_descendant(body, "div.carousel"),
                has_descendant(body, "div.wrapper-thumbnail")
                    || has_descendant(body, "div.wrapper-video"),
                body.value().classes().any(|class| class == "isDocument"),
                select_attr(body, "img.post-img-img", "src")
                    .map(|src| normalize_protocol_relative(&src)),
                select_attr(body, "video source", "src")
                    .map(|src| normalize_protocol_relative(&src)),
            ),
            None => (String::new(), false, false, false, None, None),
        };

        let mut views_raw = NOT_AVAILABLE.to_string();
        let mut views = None;
        let mut shares_raw = NOT_AVAILABLE.to_string();
        let mut shares = None;
        let mut forwards_raw = NOT_AVAILABLE.to_string();
        let mut forwards = None;

        let stats_row_selector = Selector::parse(".col.col-12.d-flex").unwrap();
        if let Some(stats_row) = card.select(&stats_row_selector).next() {
            // Each metric is keyed by a localized tooltip substring and is
            // independently optional.
            if let Some(text) = select_text(
                stats_row,
                r#"a.btn[data-original-title*="Количество просмотров публикации"]"#,
            ) {
                views = parse_magnitude(&text);
                views_raw = text;
            }
            if let Some(text) =
                select_text(stats_row, r#"a.btn[data-original-title*="Поделились"]"#)
            {
                shares = parse_magnitude(&text);
                shares_raw = text;
            }
            if let Some(text) = select_text(
                stats_row,
                r#"span.btn[data-original-title*="Пересылок всего"]"#,
            ) {
                forwards = parse_magnitude(&text);
                forwards_raw = text;
            }
        } else {
            log::warn!("no stats row for post {id}");
        }

        let tgstat_post_url = select_attr(
            card,
            r#"a[data-original-title="Постоянная ссылка на публикацию"]"#,
            "href",
        )
        .map(|href| self.absolutize(&href));

        let telegram_post_url = self.telegram_link(card, telegram_re);

        Some(PostRecord {
            id: Some(id),
            datetime_raw,
            text,
            has_photo,
            has_video,
            has_document,
            image_url,
            video_url,
            views,
            views_raw,
            shares,
            shares_raw,
            forwards,
            forwards_raw,
            tgstat_post_url,
            telegram_post_url,
        })
    }

    /// Telegram deep link: prefer the dropdown action item with an allowlisted
    /// host, fall back to the anchor with the "open in Telegram" tooltip.
    fn telegram_link(&self, card: ElementRef, telegram_re: &Regex) -> Option<String> {
        let dropdown_selector = Selector::parse(r#"a.dropdown-item[target="_blank"]"#).unwrap();
        for anchor in card.select(&dropdown_selector) {
            if let Some(href) = anchor.value().attr("href") {
                if telegram_re.is_match(href) {
                    return Some(href.to_string());
                }
            }
        }

        let titled_selector = Selector::parse("a[title]").unwrap();
        card.select(&titled_selector)
            .find(|anchor| {
                anchor
                    .value()
                    .attr("title")
                    .is_some_and(|title| title.contains("Открыть в Telegram"))
            })
            .and_then(|anchor| anchor.value().attr("href"))
            .map(|href| href.to_string())
    }

    /// Resolve an href against the base URL, leaving absolute URLs alone.
    fn absolutize(&self, href: &str) -> String {
        if href.starts_with('/') {
            format!("{}{}", self.base_url, href)
        } else if href.starts_with("http") {
            href.to_string()
        } else {
            log::warn!("unexpected href format: {href}, prepending base URL");
            format!("{}/{}", self.base_url, href)
        }
    }
}

#[derive(Debug)]
struct StatsColumns {
    subscribers: Option<i64>,
    subscribers_raw: String,
    avg_reach: Option<i64>,
    avg_reach_raw: String,
    ci_index: Option<i64>,
    ci_index_raw: String,
}

impl Default for StatsColumns {
    fn default() -> Self {
        Self {
            subscribers: None,
            subscribers_raw: NOT_AVAILABLE.to_string(),
            avg_reach: None,
            avg_reach_raw: NOT_AVAILABLE.to_string(),
            ci_index: None,
            ci_index_raw: NOT_AVAILABLE.to_string(),
        }
    }
}

/// Locate the record container, then pick cards by class: direct children
/// first, widening to a full-subtree search only when that finds nothing, so
/// an unexpectedly nested container still works without duplicating matches.
fn collect_cards<'a>(
    document: &'a Html,
    container_selector: &str,
    card_class: &str,
) -> Vec<ElementRef<'a>> {
    let container = document
        .select(&Selector::parse(container_selector).unwrap())
        .next()
        .unwrap_or_else(|| document.root_element());

    let direct: Vec<_> = container
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|element| {
            element.value().name() == "div"
                && element.value().classes().any(|class| class == card_class)
        })
        .collect();
    if !direct.is_empty() {
        return direct;
    }

    log::debug!("no direct-child div.{card_class} under container, searching whole fragment");
    let any_depth = Selector::parse(&format!("div.{card_class}")).unwrap();
    document.select(&any_depth).collect()
}

/// Trimmed text content of the first element matching `selector`, when the
/// element exists and has non-empty text.
fn select_text(scope: ElementRef, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).unwrap();
    scope.select(&selector).next().map(|element| {
        element
            .text()
            .collect::<String>()
            .trim()
            .to_string()
    })
}

fn select_attr(scope: ElementRef, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).unwrap();
    scope
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr(attr))
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
}

fn has_descendant(scope: ElementRef, selector: &str) -> bool {
    let selector = Selector::parse(selector).unwrap();
    scope.select(&selector).next().is_some()
}

/// Concatenate all `post-text` blocks, preserving paragraph breaks.
fn post_text(body: ElementRef) -> String {
    let text_selector = Selector::parse("div.post-text").unwrap();
    body.select(&text_selector)
        .map(|part| {
            part.text()
                .map(str::trim)
                .filter(|fragment| !fragment.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// `//host/path` → `https://host/path`.
fn normalize_protocol_relative(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{url}")
    } else {
        url.to_string()
    }
}

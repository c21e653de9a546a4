//! Cursor-driven pagination engine.
//!
//! The channel search and the channel post feed speak two structurally
//! similar but subtly different continuation protocols. Both are driven by
//! the same loop: ask the flow for the next page, unwrap the envelope,
//! extract records, apply the continuation hints, sleep, repeat. A flow
//! supplies the request builder, the continuation extractor, and the
//! termination predicate; the engine owns the shared failure semantics
//! (first-fetch-fatal vs. partial success) and the politeness pacing.

use crate::client::TgStatClient;
use crate::envelope::PageEnvelope;
use crate::types::{ChannelRecord, ChannelSearchParams, PostRecord};
use crate::{Result, TgStatError};
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

/// Search pages advance the offset by one page worth of results when the
/// envelope omits an explicit `nextOffset`.
const SEARCH_OFFSET_STRIDE: i64 = 30;

/// Continuation state threaded through one paginated flow.
#[derive(Debug)]
pub(crate) struct FlowState {
    /// Page index (search) or post-id cursor (feed). `None` means no usable
    /// cursor remains and the flow cannot safely continue.
    pub page: Option<i64>,
    pub offset: i64,
    /// Requests issued so far by the engine. The seed fetch, if any, is not
    /// counted; it happens before the engine runs.
    pub requests: u32,
    pub has_more: bool,
    /// Whether the flow was seeded with records before the loop started. A
    /// seeded flow never treats a failure as fatal, and it sleeps before its
    /// first request too.
    pub seeded: bool,
}

#[async_trait(?Send)]
pub(crate) trait PageFlow {
    type Record;

    /// Flow name for diagnostics.
    fn label(&self) -> &'static str;

    /// Issue the request for the current state and decode the envelope.
    async fn request_page(&mut self, state: &FlowState) -> Result<PageEnvelope>;

    /// Extract records from the envelope's embedded HTML.
    fn extract(&mut self, html: &str) -> Vec<Self::Record>;

    /// Apply the envelope's continuation hints to the state.
    fn advance(&mut self, state: &mut FlowState, envelope: &PageEnvelope, batch: &[Self::Record]);

    /// Whether another page should be requested.
    fn wants_more(&self, state: &FlowState, collected: usize) -> bool;

    /// Politeness delay range in seconds, sampled before each request.
    fn delay_range(&self) -> (f64, f64);
}

/// Run a flow to completion, accumulating records.
///
/// Failure semantics: a transport failure or non-ok envelope on the very
/// first fetch of an unseeded flow is a total failure; any later failure
/// terminates pagination early and returns what has been accumulated.
pub(crate) async fn drain<F: PageFlow>(
    flow: &mut F,
    mut state: FlowState,
    seed: Vec<F::Record>,
) -> Result<Vec<F::Record>> {
    let mut records = seed;

    while flow.wants_more(&state, records.len()) {
        if state.requests > 0 || state.seeded {
            politeness_pause(flow.delay_range()).await;
        }

        let first_fetch = state.requests == 0 && !state.seeded;
        let envelope = match flow.request_page(&state).await {
            Ok(envelope) => envelope,
            Err(err) => {
                if first_fetch {
                    return Err(err);
                }
                log::error!(
                    "{}: page request failed, stopping with {} records: {err}",
                    flow.label(),
                    records.len()
                );
                break;
            }
        };
        state.requests += 1;

        if !envelope.status_ok() {
            let err = TgStatError::EnvelopeStatus(envelope.status.clone());
            if first_fetch {
                return Err(err);
            }
            log::error!("{}: {err}, stopping with {} records", flow.label(), records.len());
            break;
        }

        let html = envelope.html_fragment();
        if html.trim().is_empty() {
            log::warn!("{}: empty HTML payload, treating as end of data", flow.label());
            state.has_more = false;
            break;
        }

        let batch = flow.extract(html);
        if batch.is_empty() {
            if first_fetch {
                log::info!("{}: no records on first page", flow.label());
            } else {
                log::debug!("{}: no new records extracted, end of data", flow.label());
            }
            state.has_more = false;
            break;
        }

        log::info!(
            "{}: extracted {} records on request {} (total {})",
            flow.label(),
            batch.len(),
            state.requests,
            records.len() + batch.len()
        );
        flow.advance(&mut state, &envelope, &batch);
        records.extend(batch);
    }

    Ok(records)
}

async fn politeness_pause((min_secs, max_secs): (f64, f64)) {
    if max_secs <= 0.0 {
        return;
    }
    let secs = rand::thread_rng().gen_range(min_secs..=max_secs);
    log::debug!("sleeping {secs:.2}s before next request");
    tokio::time::sleep(Duration::from_secs_f64(secs)).await;
}

/// Channel search: page/offset pagination over the search endpoint.
pub(crate) struct SearchFlow<'a> {
    pub client: &'a mut TgStatClient,
    pub params: &'a ChannelSearchParams,
}

#[async_trait(?Send)]
impl PageFlow for SearchFlow<'_> {
    type Record = ChannelRecord;

    fn label(&self) -> &'static str {
        "channel search"
    }

    async fn request_page(&mut self, state: &FlowState) -> Result<PageEnvelope> {
        self.client
            .fetch_search_page(self.params, state.page.unwrap_or(0), state.offset)
            .await
    }

    fn extract(&mut self, html: &str) -> Vec<ChannelRecord> {
        self.client.parser().parse_channel_cards(html)
    }

    fn advance(&mut self, state: &mut FlowState, envelope: &PageEnvelope, _batch: &[ChannelRecord]) {
        state.has_more = envelope.has_more;
        state.page = Some(
            envelope
                .next_page_id()
                .unwrap_or_else(|| state.page.unwrap_or(0) + 1),
        );
        state.offset = envelope
            .next_offset
            .unwrap_or(state.offset + SEARCH_OFFSET_STRIDE);
    }

    fn wants_more(&self, state: &FlowState, _collected: usize) -> bool {
        state.has_more && (state.requests as usize) < self.params.max_pages
    }

    fn delay_range(&self) -> (f64, f64) {
        self.client.config().search_delay
    }
}

/// Channel post feed: post-id cursor pagination over the load-more endpoint.
pub(crate) struct PostsFlow<'a> {
    pub client: &'a mut TgStatClient,
    pub handle: &'a str,
    pub max_posts: usize,
}

#[async_trait(?Send)]
impl PageFlow for PostsFlow<'_> {
    type Record = PostRecord;

    fn label(&self) -> &'static str {
        "channel posts"
    }

    async fn request_page(&mut self, state: &FlowState) -> Result<PageEnvelope> {
        // wants_more guarantees the cursor is present here.
        let cursor = state.page.unwrap_or_default();
        self.client
            .fetch_more_posts(self.handle, cursor, state.offset)
            .await
    }

    fn extract(&mut self, html: &str) -> Vec<PostRecord> {
        self.client.parser().parse_post_cards(html)
    }

    fn advance(&mut self, state: &mut FlowState, envelope: &PageEnvelope, batch: &[PostRecord]) {
        state.has_more = envelope.has_more;

        // Most-recent-first feeds should never hand out an id above the
        // cursor that requested them; if one appears, the upstream protocol
        // has probably changed.
        if let (Some(cursor), Some(first_id)) =
            (state.page, batch.first().and_then(|post| post.id))
        {
            if first_id > cursor {
                log::warn!(
                    "post ids are not monotonically non-increasing ({first_id} after cursor {cursor})"
                );
            }
        }

        state.page = match envelope.next_page_id() {
            Some(id) => Some(id),
            None => {
                let fallback = batch.last().and_then(|post| post.id);
                match fallback {
                    Some(id) => log::warn!(
                        "nextPage missing from envelope, using last parsed post id {id}"
                    ),
                    None => log::warn!("no cursor available for the next posts request"),
                }
                fallback
            }
        };
        state.offset = envelope
            .next_offset
            .unwrap_or(state.offset + batch.len() as i64);
    }

    fn wants_more(&self, state: &FlowState, collected: usize) -> bool {
        collected < self.max_posts && state.has_more && state.page.is_some()
    }

    fn delay_range(&self) -> (f64, f64) {
        self.client.config().feed_delay
    }
}

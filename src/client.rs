use crate::driver::{drain, FlowState, PostsFlow, SearchFlow};
use crate::envelope::PageEnvelope;
use crate::headers;
use crate::parsing::TgStatParser;
use crate::session::TokenSession;
use crate::types::{ChannelRecord, ChannelSearchParams, PostRecord, ScrapeConfig};
use crate::{Result, TgStatError};
use http_client::{HttpClient, Request, Response};
use http_types::{Method, Url};

/// Main client for scraping TGStat's web interface.
///
/// The client owns the single [`TokenSession`] for the run and drives the
/// two paginated flows, channel search and channel post feed, against the
/// site's AJAX endpoints, which answer with JSON envelopes wrapping
/// server-rendered HTML fragments.
///
/// # Examples
///
/// ```rust,no_run
/// use tgstat_scrape::{ChannelSearchParams, Result, TgStatClient};
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let http_client = http_client::native::NativeClient::new();
///     let mut client = TgStatClient::new(Box::new(http_client));
///
///     // Obtain the anti-forgery token; failure here is fatal to the run.
///     client.establish_session().await?;
///
///     let params = ChannelSearchParams::new("новости").with_max_pages(2);
///     let channels = client.search_channels(&params).await?;
///     println!("found {} channels", channels.len());
///
///     let posts = client.channel_posts("@rian_ru", 45).await?;
///     println!("fetched {} posts", posts.len());
///     Ok(())
/// }
/// ```
pub struct TgStatClient {
    http: Box<dyn HttpClient>,
    base_url: String,
    session: TokenSession,
    parser: TgStatParser,
    config: ScrapeConfig,
}

impl TgStatClient {
    /// Create a new [`TgStatClient`] against the default TGStat URL.
    pub fn new(http: Box<dyn HttpClient>) -> Self {
        Self::with_base_url(http, "https://tgstat.ru".to_string())
    }

    /// Create a new [`TgStatClient`] with a custom base URL.
    ///
    /// Useful for testing or regional mirrors.
    pub fn with_base_url(http: Box<dyn HttpClient>, base_url: String) -> Self {
        Self::with_config(http, base_url, ScrapeConfig::default())
    }

    /// Create a new [`TgStatClient`] with custom pacing configuration.
    pub fn with_config(http: Box<dyn HttpClient>, base_url: String, config: ScrapeConfig) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            http,
            parser: TgStatParser::new(base_url.clone()),
            base_url,
            session: TokenSession::new(),
            config,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    pub fn parser(&self) -> &TgStatParser {
        &self.parser
    }

    /// Read access to the session state (token, cookies, refresh time).
    pub fn session(&self) -> &TokenSession {
        &self.session
    }

    fn search_url(&self) -> String {
        format!("{}/channels/search", self.base_url)
    }

    fn channel_url(&self, handle: &str) -> String {
        format!("{}/channel/@{}", self.base_url, handle.trim_start_matches('@'))
    }

    /// Perform the initial token refresh.
    ///
    /// The scraper cannot operate without an anti-forgery token, so a
    /// failure here is fatal to the run.
    pub async fn establish_session(&mut self) -> Result<()> {
        self.refresh_token(None).await.map(|_| ())
    }

    /// Return the current token, refreshing it first if none is stored.
    pub async fn acquire_token(&mut self, landing_url: Option<&str>) -> Result<String> {
        if let Some(token) = self.session.token() {
            return Ok(token.to_string());
        }
        self.refresh_token(landing_url).await
    }

    /// Fetch a token-carrier page and extract a fresh anti-forgery token.
    ///
    /// Defaults to the channel-search page, which embeds the token in a meta
    /// tag. The cookie jar is updated as a side effect of the page fetch.
    /// On any failure the stored token is left cleared, never stale.
    pub async fn refresh_token(&mut self, landing_url: Option<&str>) -> Result<String> {
        let url = landing_url
            .map(|url| url.to_string())
            .unwrap_or_else(|| self.search_url());
        log::info!("refreshing anti-forgery token from {url}");

        let referer = format!("{}/", self.base_url);
        let html = match self.get_page(&url, Some(&referer)).await {
            Ok(html) => html,
            Err(err) => {
                self.session.invalidate();
                return Err(TgStatError::TokenUnavailable(format!(
                    "token page fetch failed: {err}"
                )));
            }
        };
        self.session.update_from_page(&html)
    }

    /// Drop the stored token so the next acquire forces a refresh.
    ///
    /// Called when a dependent request is suspected to have failed because
    /// the token expired.
    pub fn invalidate_token(&mut self) {
        self.session.invalidate();
    }

    /// Search for channels, paginating until the page budget or the end of
    /// the result set.
    ///
    /// A failure on the first page is a total failure and returns `Err`; a
    /// first page that parses to zero records returns `Ok(vec![])` ("no
    /// results", a distinct outcome). Failures on later pages terminate
    /// pagination and return what has been accumulated.
    pub async fn search_channels(
        &mut self,
        params: &ChannelSearchParams,
    ) -> Result<Vec<ChannelRecord>> {
        let state = FlowState {
            page: Some(0),
            offset: 0,
            requests: 0,
            has_more: true,
            seeded: false,
        };
        let mut flow = SearchFlow {
            client: self,
            params,
        };
        drain(&mut flow, state, Vec::new()).await
    }

    /// Fetch up to `max_posts` posts from a channel's feed.
    ///
    /// The feed is seeded from the channel's landing page; a failure there
    /// is fatal since no cursor exists to resume from. Once seeded, any
    /// load-more failure yields the partial batch instead of an error. The
    /// result is truncated to exactly `max_posts`.
    pub async fn channel_posts(&mut self, handle: &str, max_posts: usize) -> Result<Vec<PostRecord>> {
        if handle.trim_start_matches('@').trim().is_empty() {
            return Err(TgStatError::Parse("channel handle is empty".to_string()));
        }

        let landing = self.fetch_channel_landing(handle).await?;
        let seed = self.parser.parse_post_cards(&landing);
        if seed.is_empty() {
            log::info!("no initial posts found for {handle}");
            return Ok(Vec::new());
        }
        log::info!("fetched {} initial posts for {handle}", seed.len());

        let state = FlowState {
            page: seed.last().and_then(|post| post.id),
            offset: seed.len() as i64,
            requests: 0,
            has_more: true,
            seeded: true,
        };
        let mut flow = PostsFlow {
            client: self,
            handle,
            max_posts,
        };
        let mut posts = drain(&mut flow, state, seed).await?;
        posts.truncate(max_posts);
        Ok(posts)
    }

    /// POST one page of the channel search and decode its envelope.
    pub async fn fetch_search_page(
        &mut self,
        params: &ChannelSearchParams,
        page: i64,
        offset: i64,
    ) -> Result<PageEnvelope> {
        let url = self.search_url();
        log::info!(
            "searching channels: query {:?}, page {page}, offset {offset}",
            params.query
        );
        self.post_envelope(&url, &url, |token| search_form(token, params, page, offset), None)
            .await
    }

    /// GET a channel's landing page, which carries the initial post batch.
    pub async fn fetch_channel_landing(&mut self, handle: &str) -> Result<String> {
        let url = self.channel_url(handle);
        let referer = self.search_url();
        log::info!("fetching channel landing page {url}");
        self.get_page(&url, Some(&referer)).await
    }

    /// POST a "load more posts" request keyed by cursor and offset.
    pub async fn fetch_more_posts(
        &mut self,
        handle: &str,
        cursor: i64,
        offset: i64,
    ) -> Result<PageEnvelope> {
        let channel_url = self.channel_url(handle);
        let url = format!("{channel_url}/posts-last");
        log::info!("requesting more posts for {handle}, cursor {cursor}, offset {offset}");
        self.post_envelope(
            &url,
            &channel_url,
            |token| posts_form(token, cursor, offset),
            Some(&channel_url),
        )
        .await
    }

    /// POST a form to an AJAX endpoint and decode the JSON envelope.
    ///
    /// A 403 answer is treated as a token expiry: the token is invalidated,
    /// refreshed (from `refresh_landing` when given), and the request is
    /// retried exactly once.
    async fn post_envelope<B>(
        &mut self,
        url: &str,
        referer: &str,
        build_form: B,
        refresh_landing: Option<&str>,
    ) -> Result<PageEnvelope>
    where
        B: Fn(&str) -> Vec<(String, String)>,
    {
        let token = self.acquire_token(refresh_landing).await?;
        let mut response = self.send_form(url, referer, &build_form(&token)).await?;

        if response.status() == 403 {
            log::warn!("POST {url} returned 403, refreshing token and retrying once");
            self.invalidate_token();
            let token = self.acquire_token(refresh_landing).await?;
            response = self.send_form(url, referer, &build_form(&token)).await?;
        }

        if !response.status().is_success() {
            return Err(TgStatError::Http(format!(
                "POST {url} returned {}",
                response.status()
            )));
        }

        let body = response
            .body_string()
            .await
            .map_err(|err| TgStatError::Http(err.to_string()))?;
        serde_json::from_str(&body)
            .map_err(|err| TgStatError::Parse(format!("invalid JSON envelope from {url}: {err}")))
    }

    async fn send_form(
        &mut self,
        url: &str,
        referer: &str,
        pairs: &[(String, String)],
    ) -> Result<Response> {
        let parsed = url
            .parse::<Url>()
            .map_err(|err| TgStatError::Http(format!("invalid URL {url}: {err}")))?;
        let mut request = Request::new(Method::Post, parsed);
        headers::add_ajax_headers(&mut request, &self.base_url, referer);
        headers::add_cookies(&mut request, self.session.cookies());
        request.set_body(encode_form(pairs));
        self.send_with_timeout(request).await
    }

    async fn get_page(&mut self, url: &str, referer: Option<&str>) -> Result<String> {
        let parsed = url
            .parse::<Url>()
            .map_err(|err| TgStatError::Http(format!("invalid URL {url}: {err}")))?;
        let mut request = Request::new(Method::Get, parsed);
        headers::add_page_headers(&mut request, referer);
        headers::add_cookies(&mut request, self.session.cookies());

        let mut response = self.send_with_timeout(request).await?;
        if !response.status().is_success() {
            return Err(TgStatError::Http(format!(
                "GET {url} returned {}",
                response.status()
            )));
        }
        response
            .body_string()
            .await
            .map_err(|err| TgStatError::Http(err.to_string()))
    }

    /// Send a request, bounding it with the configured per-request timeout
    /// and folding any `Set-Cookie` headers into the session jar.
    async fn send_with_timeout(&mut self, request: Request) -> Result<Response> {
        let response = tokio::time::timeout(self.config.request_timeout, self.http.send(request))
            .await
            .map_err(|_| {
                TgStatError::Http(format!(
                    "request timed out after {:?}",
                    self.config.request_timeout
                ))
            })?
            .map_err(|err| TgStatError::Http(err.to_string()))?;
        self.session.absorb_cookies(&response);
        Ok(response)
    }
}

fn encode_form(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| {
            format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Form body for one channel search page.
///
/// The duplicate keys (`noRedLabel`, `noScam`, `noDead`) and the
/// `countries[<id>]=<id>` shape replay the exact encoding observed on the
/// wire; the endpoint represents its exclusion toggles as repeated
/// key/value pairs rather than booleans, and that encoding is preserved
/// verbatim.
fn search_form(
    token: &str,
    params: &ChannelSearchParams,
    page: i64,
    offset: i64,
) -> Vec<(String, String)> {
    let pair = |key: &str, value: &str| (key.to_string(), value.to_string());
    vec![
        pair("_tgstat_csrk", token),
        pair("view", "list"),
        pair("sort", params.sort.as_str()),
        pair("q", &params.query),
        pair("inAbout", "0"),
        pair("categories", ""),
        pair("countries", ""),
        (
            format!("countries[{}]", params.country_id),
            params.country_id.to_string(),
        ),
        pair("languages", ""),
        pair("channelType", ""),
        pair("age", "0-120"),
        pair("err", "0-100"),
        pair("er", "0"),
        pair("male", "0"),
        pair("female", "0"),
        pair("participantsCountFrom", ""),
        pair("participantsCountTo", ""),
        pair("avgReachFrom", ""),
        pair("avgReachTo", ""),
        pair("avgReach24From", ""),
        pair("avgReach24To", ""),
        pair("ciFrom", ""),
        pair("ciTo", ""),
        pair("isVerified", "0"),
        pair("isRknVerified", "0"),
        pair("isStoriesAvailable", "0"),
        pair("noRedLabel", "0"),
        pair("noRedLabel", "1"),
        pair("noScam", "0"),
        pair("noScam", "1"),
        pair("noDead", "0"),
        pair("noDead", "1"),
        pair("page", &page.to_string()),
        pair("offset", &offset.to_string()),
    ]
}

/// Form body for one "load more posts" request. `hideDeleted` keeps the
/// wire-observed duplicate-key encoding; `hideForwards` is a single pair.
fn posts_form(token: &str, cursor: i64, offset: i64) -> Vec<(String, String)> {
    let pair = |key: &str, value: &str| (key.to_string(), value.to_string());
    vec![
        pair("_tgstat_csrk", token),
        pair("date", "0"),
        pair("q", ""),
        pair("hideDeleted", "0"),
        pair("hideDeleted", "1"),
        pair("hideForwards", "0"),
        pair("page", &cursor.to_string()),
        pair("offset", &offset.to_string()),
    ]
}

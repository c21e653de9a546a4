//! Anti-forgery token and cookie state for one scraping run.

use crate::{Result, TgStatError};
use chrono::{DateTime, Utc};
use http_client::Response;
use scraper::{Html, Selector};

/// Session state behind all authenticated requests: the cookie jar and the
/// current anti-forgery token.
///
/// Exactly one instance lives per scraping run. It is pure state: the
/// client performs the token-carrier page fetch and hands the HTML to
/// [`update_from_page`](Self::update_from_page). Nothing is persisted; the
/// session dies with the process.
#[derive(Debug, Default)]
pub struct TokenSession {
    cookies: Vec<String>,
    csrf_token: Option<String>,
    last_refreshed: Option<DateTime<Utc>>,
}

impl TokenSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored token, if one is present and has not been invalidated.
    pub fn token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    /// Cookies accumulated from every response seen so far, as
    /// `name=value` strings.
    pub fn cookies(&self) -> &[String] {
        &self.cookies
    }

    /// When the token was last successfully refreshed.
    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed
    }

    /// Clear the stored token so the next acquire forces a refresh.
    ///
    /// Called when a dependent request looks like it failed because the
    /// token expired. Cookies are kept, they stay valid independently.
    pub fn invalidate(&mut self) {
        if self.csrf_token.take().is_some() {
            log::debug!("anti-forgery token invalidated");
        }
    }

    /// Fold `Set-Cookie` headers from a response into the jar, replacing any
    /// existing cookie with the same name.
    pub fn absorb_cookies(&mut self, response: &Response) {
        if let Some(cookie_headers) = response.header("set-cookie") {
            let mut new_cookies = 0;
            for cookie_header in cookie_headers {
                // Keep only the name=value part, dropping attributes.
                if let Some(cookie_value) = cookie_header.as_str().split(';').next() {
                    let cookie_name = cookie_value.split('=').next().unwrap_or("");
                    self.cookies
                        .retain(|existing| !existing.starts_with(&format!("{cookie_name}=")));
                    self.cookies.push(cookie_value.to_string());
                    new_cookies += 1;
                }
            }
            if new_cookies > 0 {
                log::trace!(
                    "absorbed {} cookies, jar now holds {}",
                    new_cookies,
                    self.cookies.len()
                );
            }
        }
    }

    /// Extract and store the anti-forgery token from a carrier page.
    ///
    /// The token is looked for in `meta[name="csrf-token"]` first and in the
    /// hidden `_tgstat_csrk` form input second. When neither matches, the
    /// stored token is cleared (never left stale) and `TokenUnavailable` is
    /// returned.
    pub fn update_from_page(&mut self, html: &str) -> Result<String> {
        let document = Html::parse_document(html);

        let meta_selector = Selector::parse(r#"meta[name="csrf-token"]"#).unwrap();
        let token = document
            .select(&meta_selector)
            .next()
            .and_then(|meta| meta.value().attr("content"))
            .or_else(|| {
                let input_selector = Selector::parse(r#"input[name="_tgstat_csrk"]"#).unwrap();
                document
                    .select(&input_selector)
                    .next()
                    .and_then(|input| input.value().attr("value"))
            })
            .map(|token| token.to_string());

        match token {
            Some(token) if !token.is_empty() => {
                let preview: String = token.chars().take(10).collect();
                log::debug!("obtained anti-forgery token: {preview}...");
                self.csrf_token = Some(token.clone());
                self.last_refreshed = Some(Utc::now());
                Ok(token)
            }
            _ => {
                self.csrf_token = None;
                Err(TgStatError::TokenUnavailable(
                    "no token in meta tag or hidden form input".to_string(),
                ))
            }
        }
    }
}

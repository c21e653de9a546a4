//! Shared test transport and fixture builders.
//!
//! `MockHttp` stands in for the real transport behind the client's
//! `Box<dyn HttpClient>`: canned replies are queued up front and every
//! outgoing request is recorded so tests can assert on the exact wire
//! traffic (method, URL, form body, cookie replay).

#![allow(dead_code)]

use async_trait::async_trait;
use http_client::{HttpClient, Request, Response};
use http_types::{Error, StatusCode};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub body: String,
    pub cookie: Option<String>,
}

#[derive(Debug)]
enum CannedReply {
    Response {
        status: u16,
        body: String,
        cookies: Vec<String>,
    },
    TransportError(String),
}

#[derive(Debug, Default)]
struct Inner {
    replies: Mutex<VecDeque<CannedReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Queue-backed `HttpClient` double. Clone one handle into the client and
/// keep another to queue replies and inspect recorded requests.
#[derive(Debug, Clone, Default)]
pub struct MockHttp(Arc<Inner>);

impl MockHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, status: u16, body: impl Into<String>) {
        self.0
            .replies
            .lock()
            .unwrap()
            .push_back(CannedReply::Response {
                status,
                body: body.into(),
                cookies: Vec::new(),
            });
    }

    pub fn push_response_with_cookie(&self, status: u16, body: impl Into<String>, cookie: &str) {
        self.0
            .replies
            .lock()
            .unwrap()
            .push_back(CannedReply::Response {
                status,
                body: body.into(),
                cookies: vec![cookie.to_string()],
            });
    }

    pub fn push_transport_error(&self, message: &str) {
        self.0
            .replies
            .lock()
            .unwrap()
            .push_back(CannedReply::TransportError(message.to_string()));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.0.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.0.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpClient for MockHttp {
    async fn send(&self, mut req: Request) -> Result<Response, Error> {
        let body = req.body_string().await.unwrap_or_default();
        let cookie = req
            .header("cookie")
            .map(|values| values.last().as_str().to_string());
        self.0.requests.lock().unwrap().push(RecordedRequest {
            method: req.method().to_string(),
            url: req.url().to_string(),
            body,
            cookie,
        });

        let reply = self.0.replies.lock().unwrap().pop_front();
        match reply {
            Some(CannedReply::Response {
                status,
                body,
                cookies,
            }) => {
                let mut response =
                    Response::new(StatusCode::try_from(status).expect("valid status code"));
                for cookie in cookies {
                    response.append_header("set-cookie", &cookie);
                }
                response.set_body(body);
                Ok(response)
            }
            Some(CannedReply::TransportError(message)) => {
                Err(Error::from_str(StatusCode::BadGateway, message))
            }
            None => Err(Error::from_str(
                StatusCode::NotImplemented,
                "mock reply queue exhausted",
            )),
        }
    }
}

/// JSON envelope as the AJAX endpoints produce it.
pub fn envelope(
    status: &str,
    html: &str,
    has_more: bool,
    next_page: Option<i64>,
    next_offset: Option<i64>,
) -> String {
    let mut value = serde_json::json!({
        "status": status,
        "html": html,
        "hasMore": has_more,
    });
    if let Some(page) = next_page {
        value["nextPage"] = page.into();
    }
    if let Some(offset) = next_offset {
        value["nextOffset"] = offset.into();
    }
    value.to_string()
}

/// Minimal page embedding an anti-forgery token in the meta tag.
pub fn token_page(token: &str) -> String {
    format!(
        concat!(
            "<!DOCTYPE html><html><head>",
            r#"<meta name="csrf-token" content="{}">"#,
            "</head><body></body></html>",
        ),
        token
    )
}

/// A well-formed search-result card with the three-column stats block.
pub fn channel_card(handle: &str, title: &str, subscribers: &str) -> String {
    format!(
        concat!(
            r#"<div class="peer-item-row py-3">"#,
            r#"<img class="img-thumbnail" src="//static.example/img/{0}.jpg">"#,
            r#"<a href="/channel/@{0}/stat">"#,
            r#"<div class="text-truncate font-16 text-dark mt-n1">{1}</div>"#,
            "</a>",
            r#"<span class="border rounded bg-light px-1">Новости и СМИ</span>"#,
            r#"<div class="col col-12 col-sm-7"><div class="row">"#,
            r#"<div class="col col-4 pt-1"><h4>{2}</h4><small>подписчики</small></div>"#,
            r#"<div class="col col-4 pt-1"><h4>850.4k</h4><small>охват</small></div>"#,
            r#"<div class="col col-4 pt-1"><h4>9 279</h4><small>индекс</small></div>"#,
            "</div></div>",
            "</div>",
        ),
        handle, title, subscribers
    )
}

/// Search-result fragment wrapping cards in the list container.
pub fn search_fragment(cards: &[String]) -> String {
    format!(
        r#"<div id="channels-list-holder">{}</div>"#,
        cards.concat()
    )
}

/// A minimal post card carrying the id anchor, one text block, and a views
/// counter.
pub fn post_card(id: i64, views: &str) -> String {
    format!(
        concat!(
            r#"<div class="post-container" id="post-{0}">"#,
            r#"<div class="post-header"><small>07.08.2026 12:30</small></div>"#,
            r#"<div class="post-body"><div class="post-text">Пост номер {0}</div></div>"#,
            r#"<div class="col col-12 d-flex">"#,
            r#"<a class="btn" data-original-title="Количество просмотров публикации">{1}</a>"#,
            "</div>",
            "</div>",
        ),
        id, views
    )
}

/// Post cards for `count` ids counting down from `first_id`.
pub fn descending_posts(first_id: i64, count: i64) -> String {
    (0..count)
        .map(|n| post_card(first_id - n, "1.2k"))
        .collect()
}

/// Channel landing page: token meta tag plus the initial post batch.
pub fn landing_page(token: &str, posts_html: &str) -> String {
    format!(
        concat!(
            "<!DOCTYPE html><html><head>",
            r#"<meta name="csrf-token" content="{}">"#,
            "</head><body>",
            r#"<div class="posts-list">{}</div>"#,
            "</body></html>",
        ),
        token, posts_html
    )
}

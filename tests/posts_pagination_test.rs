mod common;

use common::{descending_posts, envelope, landing_page, token_page, MockHttp};
use tgstat_scrape::{ScrapeConfig, TgStatClient, TgStatError};

fn test_client(http: &MockHttp) -> TgStatClient {
    TgStatClient::with_config(
        Box::new(http.clone()),
        "https://tgstat.ru".to_string(),
        ScrapeConfig::without_delays(),
    )
}

#[tokio::test]
async fn feed_truncates_to_requested_maximum_and_falls_back_to_parsed_cursor() {
    let http = MockHttp::new();
    http.push_response(200, token_page("tok"));
    // Landing page carries posts 1000..981.
    http.push_response(200, landing_page("tok", &descending_posts(1000, 20)));
    // Both load-more envelopes omit nextPage, forcing the cursor to fall
    // back to the last parsed post id.
    http.push_response(200, envelope("ok", &descending_posts(980, 20), true, None, None));
    http.push_response(200, envelope("ok", &descending_posts(960, 20), true, None, None));

    let mut client = test_client(&http);
    client.establish_session().await.unwrap();

    let posts = client.channel_posts("@rian_ru", 45).await.unwrap();
    assert_eq!(posts.len(), 45);
    assert_eq!(posts[0].id, Some(1000));
    assert_eq!(posts[44].id, Some(956));

    let requests = http.requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[1].method, "GET");
    assert!(requests[1].url.ends_with("/channel/@rian_ru"));
    assert!(requests[2].url.ends_with("/channel/@rian_ru/posts-last"));

    // First load-more is keyed by the last landing-page post id.
    assert!(requests[2].body.contains("page=981"));
    assert!(requests[2].body.contains("offset=20"));
    // The next request's cursor is the last post id of the previous batch,
    // since no explicit nextPage was present in the envelope.
    assert!(requests[3].body.contains("page=961"));
    assert!(requests[3].body.contains("offset=40"));
}

#[tokio::test]
async fn explicit_envelope_cursor_wins_over_parsed_ids() {
    let http = MockHttp::new();
    http.push_response(200, token_page("tok"));
    http.push_response(200, landing_page("tok", &descending_posts(1000, 20)));
    http.push_response(
        200,
        envelope("ok", &descending_posts(980, 20), true, Some(975), Some(55)),
    );
    http.push_response(200, envelope("ok", &descending_posts(960, 20), false, None, None));

    let mut client = test_client(&http);
    client.establish_session().await.unwrap();
    client.channel_posts("rian_ru", 100).await.unwrap();

    let requests = http.requests();
    assert!(requests[3].body.contains("page=975"));
    assert!(requests[3].body.contains("offset=55"));
}

#[tokio::test]
async fn landing_page_failure_is_fatal() {
    let http = MockHttp::new();
    http.push_response(200, token_page("tok"));
    http.push_transport_error("connection refused");

    let mut client = test_client(&http);
    client.establish_session().await.unwrap();

    let err = client.channel_posts("@rian_ru", 10).await.unwrap_err();
    assert!(matches!(err, TgStatError::Http(_)));
}

#[tokio::test]
async fn landing_page_with_no_posts_is_an_empty_list() {
    let http = MockHttp::new();
    http.push_response(200, token_page("tok"));
    http.push_response(200, landing_page("tok", ""));

    let mut client = test_client(&http);
    client.establish_session().await.unwrap();

    let posts = client.channel_posts("@rian_ru", 10).await.unwrap();
    assert!(posts.is_empty());
    // No load-more request may follow an empty seed.
    assert_eq!(http.request_count(), 2);
}

#[tokio::test]
async fn load_more_failure_returns_partial_batch() {
    let http = MockHttp::new();
    http.push_response(200, token_page("tok"));
    http.push_response(200, landing_page("tok", &descending_posts(1000, 20)));
    http.push_transport_error("connection reset");

    let mut client = test_client(&http);
    client.establish_session().await.unwrap();

    let posts = client.channel_posts("@rian_ru", 100).await.unwrap();
    assert_eq!(posts.len(), 20);
}

#[tokio::test]
async fn non_ok_load_more_status_returns_partial_batch() {
    let http = MockHttp::new();
    http.push_response(200, token_page("tok"));
    http.push_response(200, landing_page("tok", &descending_posts(1000, 20)));
    http.push_response(200, envelope("error", "", false, None, None));

    let mut client = test_client(&http);
    client.establish_session().await.unwrap();

    let posts = client.channel_posts("@rian_ru", 100).await.unwrap();
    assert_eq!(posts.len(), 20);
}

#[tokio::test]
async fn empty_load_more_html_ends_the_feed() {
    let http = MockHttp::new();
    http.push_response(200, token_page("tok"));
    http.push_response(200, landing_page("tok", &descending_posts(1000, 20)));
    http.push_response(200, envelope("ok", "", true, Some(979), None));

    let mut client = test_client(&http);
    client.establish_session().await.unwrap();

    let posts = client.channel_posts("@rian_ru", 100).await.unwrap();
    assert_eq!(posts.len(), 20);
    assert_eq!(http.request_count(), 3);
}

#[tokio::test]
async fn has_more_false_stops_the_feed_before_the_budget() {
    let http = MockHttp::new();
    http.push_response(200, token_page("tok"));
    http.push_response(200, landing_page("tok", &descending_posts(1000, 20)));
    http.push_response(
        200,
        envelope("ok", &descending_posts(980, 20), false, Some(960), None),
    );

    let mut client = test_client(&http);
    client.establish_session().await.unwrap();

    let posts = client.channel_posts("@rian_ru", 100).await.unwrap();
    assert_eq!(posts.len(), 40);
    assert_eq!(http.request_count(), 3);
}

#[tokio::test]
async fn empty_handle_is_rejected() {
    let http = MockHttp::new();
    let mut client = test_client(&http);
    let err = client.channel_posts("@", 10).await.unwrap_err();
    assert!(matches!(err, TgStatError::Parse(_)));
    assert_eq!(http.request_count(), 0);
}

#[tokio::test]
async fn load_more_requests_replay_session_cookies() {
    let http = MockHttp::new();
    http.push_response_with_cookie(200, token_page("tok"), "_tgstat_csrk=cookiejar; Path=/");
    http.push_response(200, landing_page("tok", &descending_posts(1000, 20)));
    http.push_response(200, envelope("ok", &descending_posts(980, 20), false, None, None));

    let mut client = test_client(&http);
    client.establish_session().await.unwrap();
    client.channel_posts("@rian_ru", 40).await.unwrap();

    let requests = http.requests();
    let cookie = requests[2].cookie.as_deref().unwrap();
    assert!(cookie.contains("_tgstat_csrk=cookiejar"));
}

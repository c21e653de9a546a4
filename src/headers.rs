use http_client::Request;

/// Firefox user agent replayed on every request.
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:137.0) Gecko/20100101 Firefox/137.0";

/// Add common browser headers to a request
pub fn add_common_headers(request: &mut Request) {
    let _ = request.insert_header("User-Agent", USER_AGENT);
    let _ = request.insert_header("Accept-Language", "ru-RU,ru;q=0.8,en-US;q=0.5,en;q=0.3");
    let _ = request.insert_header("Accept-Encoding", "gzip, deflate, br, zstd");
    let _ = request.insert_header("Connection", "keep-alive");
}

/// Add headers for full page navigation GETs
pub fn add_page_headers(request: &mut Request, referer_url: Option<&str>) {
    add_common_headers(request);
    let _ = request.insert_header(
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
    );
    let _ = request.insert_header("Upgrade-Insecure-Requests", "1");
    let _ = request.insert_header("Sec-Fetch-Dest", "document");
    let _ = request.insert_header("Sec-Fetch-Mode", "navigate");
    let _ = request.insert_header("Sec-Fetch-Site", "same-origin");
    let _ = request.insert_header("Priority", "u=0, i");
    if let Some(referer) = referer_url {
        let _ = request.insert_header("Referer", referer);
    }
}

/// Add headers for AJAX form POSTs
pub fn add_ajax_headers(request: &mut Request, origin: &str, referer_url: &str) {
    add_common_headers(request);
    let _ = request.insert_header("Accept", "*/*");
    let _ = request.insert_header(
        "Content-Type",
        "application/x-www-form-urlencoded; charset=UTF-8",
    );
    let _ = request.insert_header("X-Requested-With", "XMLHttpRequest");
    let _ = request.insert_header("Origin", origin);
    let _ = request.insert_header("Sec-Fetch-Dest", "empty");
    let _ = request.insert_header("Sec-Fetch-Mode", "cors");
    let _ = request.insert_header("Priority", "u=0");
    let _ = request.insert_header("Referer", referer_url);
}

/// Add cookies to a request if they exist
pub fn add_cookies(request: &mut Request, cookies: &[String]) {
    if !cookies.is_empty() {
        let cookie_header = cookies.join("; ");
        let _ = request.insert_header("Cookie", &cookie_header);
    }
}

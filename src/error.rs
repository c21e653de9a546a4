use thiserror::Error;

/// Error types for TGStat operations.
///
/// The variants mirror the ways a scraping run can fail: the transport layer
/// (network, timeout, non-2xx), the anti-forgery token lifecycle, the JSON
/// envelope returned by the AJAX endpoints, and response parsing.
///
/// Field-level extraction misses are deliberately *not* errors: the
/// extractor degrades to sentinel values and keeps going. Only failures that
/// stop a request or a whole pagination loop surface here.
#[derive(Error, Debug)]
pub enum TgStatError {
    /// HTTP/network related errors.
    ///
    /// Connection failures, per-request timeouts, and unexpected status
    /// codes all land here. A pagination loop that hits this mid-run stops
    /// and returns whatever it has accumulated; on the very first fetch of
    /// an operation it propagates to the caller instead.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The anti-forgery token could not be obtained.
    ///
    /// Raised when the token-carrier page fetch fails or when neither the
    /// meta tag nor the hidden form input contains a token. Fatal at
    /// session establishment; recoverable mid-run via refresh-and-retry.
    #[error("anti-forgery token unavailable: {0}")]
    TokenUnavailable(String),

    /// An AJAX endpoint answered with a non-"ok" envelope status.
    ///
    /// Treated exactly like a transport failure for pagination control flow.
    #[error("endpoint returned envelope status {0:?}")]
    EnvelopeStatus(String),

    /// Failed to parse a response.
    ///
    /// Typically a JSON envelope that did not decode, which usually means
    /// TGStat changed their protocol or served an error page.
    #[error("failed to parse response: {0}")]
    Parse(String),
}

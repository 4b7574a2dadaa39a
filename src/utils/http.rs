use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;

pub(crate) fn default_headers() -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(ACCEPT, HeaderValue::from_static("application/json"));
    h.insert("cache-control", HeaderValue::from_static("no-cache"));
    h
}

/// Build an HTTP client with a per-request timeout
pub fn build_client(timeout_secs: u64) -> Client {
    let builder = Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .user_agent(concat!("wagate/", env!("CARGO_PKG_VERSION")))
        .default_headers(default_headers());

    tracing::info!("Initialized HTTP client (timeout={}s)", timeout_secs);
    builder.build().unwrap_or_else(|_| Client::new())
}

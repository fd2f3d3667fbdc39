//! User-Agent string sent with metadata and range requests.

/// Project URL for User-Agent identification (good citizenship; RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fierce/chunky";

/// Default User-Agent for HEAD and ranged GET requests.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("chunky/{version} (parallel-downloader; +{PROJECT_UA_URL})")
}

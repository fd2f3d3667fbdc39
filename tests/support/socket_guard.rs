use std::net::TcpListener;

use wiremock::MockServer;

const REQUIRE_ENV: &str = "CHUNKY_REQUIRE_SOCKET_TESTS";

/// Starts a mock server, or returns `None` when localhost cannot be bound.
///
/// Set `CHUNKY_REQUIRE_SOCKET_TESTS=1` to turn the skip into a failure.
#[track_caller]
pub fn start_mock_server_or_skip() -> impl Future<Output = Option<MockServer>> {
    let location = std::panic::Location::caller();
    let can_bind = TcpListener::bind("127.0.0.1:0").is_ok();

    async move {
        if can_bind {
            return Some(MockServer::start().await);
        }

        let required = std::env::var(REQUIRE_ENV)
            .is_ok_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));
        let message = format!(
            "cannot bind a localhost socket for the test at {}:{}",
            location.file(),
            location.line()
        );
        assert!(!required, "{message}; unset {REQUIRE_ENV} to skip instead");
        eprintln!("{message}; skipping");
        None
    }
}

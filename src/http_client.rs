use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

// Ratings and prices are fetched once before a run; a slow provider falls
// back to static data rather than stalling startup.
const REQUEST_TIMEOUT_SECS: u64 = 5;
const USER_AGENT: &str = "Mozilla/5.0 (compatible; wc26-bracket-sim/0.1)";

static CLIENT: OnceCell<Client> = OnceCell::new();

pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build http client")
    })
}

/// First 220 characters of a response body on one line, for error messages.
pub fn body_snippet(body: &str) -> String {
    body.trim()
        .replace(['\n', '\r'], " ")
        .chars()
        .take(220)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_is_single_line_and_bounded() {
        let body = format!("line one\r\nline two\n{}", "x".repeat(500));
        let s = body_snippet(&body);
        assert!(!s.contains('\n'));
        assert_eq!(s.chars().count(), 220);
        assert!(s.starts_with("line one  line two"));
    }
}

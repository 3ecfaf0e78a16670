//! Utility modules for the relay
//!
//! - **error**: the crate-wide error type
//! - **logging**: tracing subscriber setup
//! - **task**: cancellable timer loops

pub mod bounded;
pub mod error;
pub mod logging;
pub mod task;

/// Truncate a string to at most `max_chars` characters, appending an ellipsis when cut
pub fn truncate_string(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Strip credentials from a connection string before logging it
pub fn sanitize_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            parsed.to_string()
        }
        Err(_) => "<invalid url>".to_string(),
    }
}

//! Input validation for the post-creation flow.
//!
//! Button input arrives as a single text line in the form
//! `"<label> | <url>"`. Post text is a plain message whose length must fit
//! the Telegram message limit.

use thiserror::Error;
use url::Url;

use crate::core::config::validation::{MAX_BUTTON_LABEL_LEN, MAX_POST_TEXT_LEN};

/// Separator between a button label and its URL.
const BUTTON_SEPARATOR: &str = " | ";

/// Why a button input line was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ButtonParseError {
    #[error("expected \"<label> | <url>\" format")]
    InvalidFormat,
    #[error("invalid button URL")]
    InvalidUrl,
    #[error("button label must be 1-{MAX_BUTTON_LABEL_LEN} characters")]
    InvalidLabel,
}

/// Why a post text was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PostTextError {
    #[error("post text must not be empty")]
    Empty,
    #[error("post text exceeds {MAX_POST_TEXT_LEN} characters (got {0})")]
    TooLong(usize),
}

/// Checks whether a string is acceptable as a button target.
///
/// Accepted forms: absolute `http://` / `https://` URLs and bare
/// `t.me/<something>` links.
pub fn is_valid_button_url(url: &str) -> bool {
    if let Some(rest) = url.strip_prefix("t.me/") {
        return !rest.is_empty();
    }

    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Parses a `"<label> | <url>"` line into a validated (label, url) pair.
///
/// The label must be 1-64 characters after trimming; the URL must pass
/// [`is_valid_button_url`].
pub fn parse_button_input(text: &str) -> Result<(String, String), ButtonParseError> {
    let mut parts = text.splitn(2, BUTTON_SEPARATOR);
    let (label, url) = match (parts.next(), parts.next()) {
        (Some(label), Some(url)) => (label.trim(), url.trim()),
        _ => return Err(ButtonParseError::InvalidFormat),
    };

    if label.is_empty() || label.chars().count() > MAX_BUTTON_LABEL_LEN {
        return Err(ButtonParseError::InvalidLabel);
    }
    if !is_valid_button_url(url) {
        return Err(ButtonParseError::InvalidUrl);
    }

    Ok((label.to_string(), url.to_string()))
}

/// Validates post text length (1-4096 characters after trimming).
pub fn validate_post_text(text: &str) -> Result<String, PostTextError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(PostTextError::Empty);
    }
    let len = trimmed.chars().count();
    if len > MAX_POST_TEXT_LEN {
        return Err(PostTextError::TooLong(len));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn accepts_label_and_https_url() {
        let (label, url) = parse_button_input("Buy now | https://shop.example.com").unwrap();
        assert_eq!(label, "Buy now");
        assert_eq!(url, "https://shop.example.com");
    }

    #[test]
    fn accepts_tme_link() {
        let (_, url) = parse_button_input("Канал | t.me/somechannel").unwrap();
        assert_eq!(url, "t.me/somechannel");
    }

    #[test]
    fn rejects_non_url_target() {
        assert_eq!(
            parse_button_input("Buy now | not-a-url"),
            Err(ButtonParseError::InvalidUrl)
        );
    }

    #[test]
    fn rejects_missing_separator() {
        assert_eq!(
            parse_button_input("Buy now https://shop.example.com"),
            Err(ButtonParseError::InvalidFormat)
        );
    }

    #[test]
    fn rejects_empty_label() {
        assert_eq!(
            parse_button_input(" | https://shop.example.com"),
            Err(ButtonParseError::InvalidLabel)
        );
    }

    #[test]
    fn rejects_oversized_label() {
        let label = "x".repeat(65);
        let input = format!("{} | https://shop.example.com", label);
        assert_eq!(parse_button_input(&input), Err(ButtonParseError::InvalidLabel));
    }

    #[test]
    fn accepts_64_char_label() {
        let label = "x".repeat(64);
        let input = format!("{} | https://shop.example.com", label);
        assert!(parse_button_input(&input).is_ok());
    }

    #[test]
    fn rejects_ftp_scheme() {
        assert!(!is_valid_button_url("ftp://example.com/file"));
    }

    #[test]
    fn rejects_bare_tme_prefix() {
        assert!(!is_valid_button_url("t.me/"));
    }

    #[test]
    fn post_text_trims_and_accepts() {
        assert_eq!(validate_post_text("  Hello world  ").unwrap(), "Hello world");
    }

    #[test]
    fn post_text_rejects_empty() {
        assert_eq!(validate_post_text("   "), Err(PostTextError::Empty));
    }

    #[test]
    fn post_text_rejects_over_limit() {
        let text = "a".repeat(4097);
        assert_eq!(validate_post_text(&text), Err(PostTextError::TooLong(4097)));
    }

    #[test]
    fn post_text_accepts_limit() {
        let text = "a".repeat(4096);
        assert!(validate_post_text(&text).is_ok());
    }
}

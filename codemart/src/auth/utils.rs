//! Small helpers for input normalisation and verification links.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_REGEX: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());
static USERNAME_REGEX: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]{3,32}$").ok());

/// Normalize an email for lookup/uniqueness checks.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub fn valid_email(email_normalized: &str) -> bool {
    email_normalized.len() <= 254 && EMAIL_REGEX.as_ref().is_some_and(|regex| regex.is_match(email_normalized))
}

/// Usernames are 3-32 characters of ASCII letters, digits, `_`, `.` or `-`.
pub fn valid_username(username: &str) -> bool {
    USERNAME_REGEX.as_ref().is_some_and(|regex| regex.is_match(username))
}

/// Normalize an ISO 3166-1 alpha-2 country code, returning `None` if it isn't two letters.
pub fn normalize_country_code(code: &str) -> Option<String> {
    let code = code.trim();
    (code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic())).then(|| code.to_ascii_uppercase())
}

/// Build the front-end verification link included in outbound emails.
pub fn build_verify_url(base_url: &str, token: &str) -> String {
    let base = base_url.trim_end_matches('/');
    format!("{base}/verify-email?token={token}")
}

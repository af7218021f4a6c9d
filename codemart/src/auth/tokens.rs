//! Random tokens: email verification tokens and session references.

use chrono::{DateTime, Duration, Utc};
use rand::prelude::RngExt;
use rand::rng;

/// How long an email verification token stays valid after issuance, in hours.
pub const VERIFICATION_TOKEN_TTL_HOURS: i64 = 24;

pub fn verification_token_ttl() -> Duration {
    Duration::hours(VERIFICATION_TOKEN_TTL_HOURS)
}

/// Number of random bytes behind every token (hex encoded to twice this length).
pub const TOKEN_BYTES: usize = 32;

/// Generate 256 bits of CSPRNG output as lowercase hex.
pub fn random_hex_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// An email verification token together with the instant it stops being accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl VerificationToken {
    /// Issue a fresh token valid for [`VERIFICATION_TOKEN_TTL_HOURS`] from now.
    pub fn issue() -> Self {
        Self::issue_at(Utc::now())
    }

    pub fn issue_at(now: DateTime<Utc>) -> Self {
        Self {
            token: random_hex_token(),
            expires_at: now + verification_token_ttl(),
        }
    }
}

/// A token is accepted up to and including its expiry instant.
pub fn is_expired_at(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now > expires_at
}

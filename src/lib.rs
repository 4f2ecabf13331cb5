//! # Keyhole
//!
//! Username/password login and registration in front of a couple of
//! session-gated pages.
//!
//! ## Accounts
//!
//! User records live in a [`store::CredentialStore`], by default a JSON
//! document on disk that is rewritten atomically. Passwords are stored as
//! Argon2id PHC strings; records still carrying a plaintext password are
//! upgraded the first time their owner logs in.
//!
//! ## Sessions
//!
//! A login binds the username to a server-side session addressed by a random
//! token in the `keyhole_session` cookie. Only the SHA-256 of the token is
//! kept. Tokens rotate on login, expire after a configurable lifetime and are
//! dropped on logout. Outcome messages travel between requests as flash
//! messages stored in the session.

pub mod accounts;
pub mod api;
pub mod cli;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(GIT_COMMIT_HASH.len() >= 7);
    }
}

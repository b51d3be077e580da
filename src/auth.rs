//! Challenge/response credential check for server links.
//!
//! When both sides have exchanged challenges and a keyed hash is available,
//! secrets never cross the wire in the clear: each side sends
//! `AUTH:<base64(hmac)>` instead. Without a hash provider or a challenge the
//! raw secret is sent. A configured certificate fingerprint is checked on top
//! of either form.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::{info, warn};

/// Prefix of hashed tokens.
pub const AUTH_PREFIX: &str = "AUTH:";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid key for {0}")]
    InvalidKey(&'static str),
}

/// A keyed hash usable for the challenge/response exchange.
pub trait KeyedHash: Send + Sync {
    fn name(&self) -> &'static str;

    fn hmac(&self, key: &[u8], message: &[u8]) -> Result<Vec<u8>, AuthError>;
}

/// HMAC-SHA256.
#[derive(Debug, Clone, Copy, Default)]
pub struct HmacSha256;

impl KeyedHash for HmacSha256 {
    fn name(&self) -> &'static str {
        "hmac-sha256"
    }

    fn hmac(&self, key: &[u8], message: &[u8]) -> Result<Vec<u8>, AuthError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(key)
            .map_err(|_| AuthError::InvalidKey(self.name()))?;
        mac.update(message);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// Computes the token a peer sends to prove it knows `secret`.
///
/// With a hash provider and a non-empty challenge the token is
/// `AUTH:` followed by the unpadded base-64 HMAC of the secret, keyed by the
/// challenge. Otherwise the secret itself is the token.
///
/// ```
/// # use httpd::auth::{compute_auth_token, HmacSha256};
/// let plain = compute_auth_token("hunter2", "", Some(&HmacSha256)).unwrap();
/// assert_eq!(plain, "hunter2");
///
/// let hashed = compute_auth_token("hunter2", "abc", Some(&HmacSha256)).unwrap();
/// assert!(hashed.starts_with("AUTH:"));
/// ```
pub fn compute_auth_token(
    secret: &str,
    challenge: &str,
    hash: Option<&dyn KeyedHash>,
) -> Result<String, AuthError> {
    match hash {
        Some(hash) if !challenge.is_empty() => {
            let mac = hash.hmac(challenge.as_bytes(), secret.as_bytes())?;
            Ok(format!("{}{}", AUTH_PREFIX, STANDARD_NO_PAD.encode(mac)))
        }
        _ => Ok(secret.to_string()),
    }
}

/// What we expect from one configured link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkCredentials {
    pub name: String,
    /// Secret the peer must prove it knows
    pub recv_secret: String,
    /// Expected certificate fingerprint; empty disables pinning
    pub fingerprint: String,
}

/// Per-connection state of the credential exchange.
#[derive(Clone, Default)]
pub struct Handshake {
    /// Challenge we sent to the peer
    pub our_challenge: String,
    /// Challenge the peer sent to us
    pub their_challenge: String,
    /// Use hashed tokens when possible
    pub challenge_response: bool,
    hash: Option<Arc<dyn KeyedHash>>,
}

impl Handshake {
    pub fn new(hash: Option<Arc<dyn KeyedHash>>) -> Self {
        Self {
            our_challenge: String::new(),
            their_challenge: String::new(),
            challenge_response: true,
            hash,
        }
    }

    pub fn with_challenges(mut self, ours: impl Into<String>, theirs: impl Into<String>) -> Self {
        self.our_challenge = ours.into();
        self.their_challenge = theirs.into();
        self
    }

    /// True once both sides have sent a challenge.
    pub fn challenge_exchanged(&self) -> bool {
        !self.our_challenge.is_empty() && !self.their_challenge.is_empty()
    }

    /// The token to send for `secret`, answering `challenge`.
    pub fn make_token(&self, secret: &str, challenge: &str) -> Result<String, AuthError> {
        if !challenge.is_empty() && self.hash.is_none() {
            warn!("Not using HMAC challenge/response because no keyed hash is available");
        }

        let hash = self.hash.as_deref().filter(|_| self.challenge_response);
        compute_auth_token(secret, challenge, hash)
    }

    /// Checks the token and certificate a peer presented for `link`.
    pub fn verify_peer(
        &self,
        link: &LinkCredentials,
        received_token: &str,
        actual_fingerprint: &str,
    ) -> bool {
        let expected = if self.challenge_exchanged() {
            match self.make_token(&link.recv_secret, &self.our_challenge) {
                Ok(token) => token,
                Err(e) => {
                    warn!(link = %link.name, error = %e, "Could not compute expected token");
                    return false;
                }
            }
        } else {
            link.recv_secret.clone()
        };

        if expected != received_token {
            warn!(link = %link.name, "Invalid link credentials");
            return false;
        }

        if !link.fingerprint.is_empty() {
            if link.fingerprint != actual_fingerprint {
                warn!(
                    link = %link.name,
                    expected = %link.fingerprint,
                    received = %actual_fingerprint,
                    "Invalid certificate fingerprint on link"
                );
                return false;
            }
        } else if !actual_fingerprint.is_empty() {
            info!(
                link = %link.name,
                fingerprint = %actual_fingerprint,
                "Peer presented a certificate; pin its fingerprint to tighten this link"
            );
        }

        true
    }
}

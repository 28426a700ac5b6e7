//! Query-string signing for image requests.
//!
//! A signed request carries a `sig` argument holding the hex-encoded
//! HMAC-SHA256 of every other byte of its raw query string:
//!
//! ```text
//! signature = HMAC-SHA256(client_key, raw_query_without_sig)
//! ```
//!
//! The signature covers the query exactly as sent (still percent-encoded,
//! original argument order), so any change to an argument invalidates it.
//! Every `sig` pair is removed before hashing, wherever it appears.
//!
//! # Example
//!
//! ```rust
//! use pixrelay::server::signature::QuerySigner;
//!
//! let signer = QuerySigner::new("my-secret-key");
//! let signed = signer.signed_query("url=http%3A%2F%2Fexample.com%2Fa.jpg&w=100");
//! assert!(signer.verify_query(&signed));
//! ```

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies raw query strings with a shared client key.
#[derive(Clone)]
pub struct QuerySigner {
    key: Vec<u8>,
}

impl std::fmt::Debug for QuerySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySigner").finish_non_exhaustive()
    }
}

impl QuerySigner {
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        Self {
            key: key.as_ref().to_vec(),
        }
    }

    /// Hex-encoded signature of `query` (which must not contain `sig`).
    pub fn sign_query(&self, query: &str) -> String {
        hex::encode(self.mac(query))
    }

    /// Append a `sig` argument to `query`.
    pub fn signed_query(&self, query: &str) -> String {
        let unsigned = strip_signature(query);
        let signature = self.sign_query(&unsigned);
        if unsigned.is_empty() {
            format!("sig={}", signature)
        } else {
            format!("{}&sig={}", unsigned, signature)
        }
    }

    /// Check the `sig` argument of a raw query string.
    ///
    /// Fails when `sig` is missing, repeated, not hex, or does not match.
    pub fn verify_query(&self, raw_query: &str) -> bool {
        let mut provided = None;
        for pair in raw_query.split('&') {
            if let Some(value) = pair.strip_prefix("sig=") {
                if provided.is_some() {
                    return false;
                }
                provided = Some(value);
            }
        }

        let Some(provided) = provided else {
            return false;
        };
        let Ok(provided) = hex::decode(provided) else {
            return false;
        };

        let expected = self.mac(&strip_signature(raw_query));
        provided.ct_eq(&expected).into()
    }

    fn mac(&self, message: &str) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(message.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

/// Remove every `sig` pair from a raw query, keeping the rest verbatim.
pub fn strip_signature(raw_query: &str) -> String {
    raw_query
        .split('&')
        .filter(|pair| !pair.is_empty() && *pair != "sig" && !pair.starts_with("sig="))
        .collect::<Vec<_>>()
        .join("&")
}

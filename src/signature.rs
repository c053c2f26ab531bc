//! HMAC-SHA256 signing and verification
//!
//! Gogs signs every delivery with `HMAC-SHA256(secret, raw_body)` and sends
//! the lowercase hex digest, without any `sha256=` prefix, in
//! `X-Gogs-Signature`.
//!
//! Verification recomputes the digest and compares the two hex strings with
//! [`subtle::ConstantTimeEq`], so the time taken does not depend on how many
//! leading characters match.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Keyed signer for webhook bodies
#[derive(Clone)]
pub struct Signer {
    /// MAC state with the key already absorbed; cloned per message
    keyed: HmacSha256,
}

impl Signer {
    /// Create a signer for the given shared secret
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        // HMAC accepts keys of any length, so this cannot fail
        let keyed = HmacSha256::new_from_slice(secret.as_ref())
            .expect("HMAC-SHA256 accepts keys of any length");
        Self { keyed }
    }

    /// Lowercase hex HMAC-SHA256 of `data`
    ///
    /// ```rust
    /// use gogs_webhook::signature::Signer;
    ///
    /// let signer = Signer::new("It's a Secret to Everybody");
    /// assert_eq!(
    ///     signer.sign(b"Hello, World!"),
    ///     "757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17"
    /// );
    /// ```
    pub fn sign(&self, data: &[u8]) -> String {
        let mut mac = self.keyed.clone();
        mac.update(data);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Check `signature` against a fresh signature of `data`.
    ///
    /// Never fails: any mismatch, including a length mismatch or a non-hex
    /// candidate, is simply `false`.
    pub fn verify(&self, signature: &str, data: &[u8]) -> bool {
        let expected = self.sign(data);
        expected.as_bytes().ct_eq(signature.as_bytes()).into()
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer").finish_non_exhaustive()
    }
}

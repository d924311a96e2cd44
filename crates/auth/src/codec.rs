//! Signed (and optionally encrypted) cookie values.
//!
//! Token layout, before the outer base64url:
//!
//! ```text
//! <unix-seconds>|<base64url(value)>|<hmac-sha256>
//! ```
//!
//! `value` is the serde_json form of the payload, AES-256-GCM encrypted when the
//! key-pair carries a block key (`nonce || ciphertext || tag`). The MAC covers
//! `name|timestamp|value`, so a token minted for one cookie name does not verify
//! under another.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD as B64};
use hmac::{Hmac, Mac};
use rand::{Rng, RngCore, rngs::OsRng};
use serde::{Serialize, de::DeserializeOwned};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const MIN_HASH_KEY_LEN: usize = 32;
pub const BLOCK_KEY_LEN: usize = 32;
pub const MAX_TOKEN_LEN: usize = 4096;
/// Tolerated clock drift for timestamps ahead of the verifier.
pub const MAX_CLOCK_SKEW_SECS: i64 = 60;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("codec has no key pairs")]
    NoKeys,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("value could not be serialized: {0}")]
    Serialize(String),

    #[error("value could not be deserialized: {0}")]
    Deserialize(String),

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed")]
    Decrypt,

    #[error("token exceeds {MAX_TOKEN_LEN} bytes")]
    TooLong,

    #[error("malformed token: {0}")]
    Malformed(&'static str),

    #[error("token signature does not verify")]
    InvalidMac,

    #[error("token timestamp is outside the accepted window")]
    Expired,
}

/// One signing key plus an optional encryption key.
#[derive(Clone)]
pub struct KeyPair {
    hash_key: Vec<u8>,
    block_key: Option<[u8; BLOCK_KEY_LEN]>,
}

impl KeyPair {
    pub fn new(hash_key: impl Into<Vec<u8>>, block_key: Option<[u8; BLOCK_KEY_LEN]>) -> Result<Self, CodecError> {
        let hash_key = hash_key.into();
        if hash_key.len() < MIN_HASH_KEY_LEN {
            return Err(CodecError::InvalidKey(format!(
                "hash key must be at least {MIN_HASH_KEY_LEN} bytes, got {}",
                hash_key.len()
            )));
        }
        Ok(Self { hash_key, block_key })
    }

    fn mac(&self, name: &str, timestamp: &str, value: &str) -> Result<HmacSha256, CodecError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.hash_key)
            .map_err(|e| CodecError::InvalidKey(e.to_string()))?;
        mac.update(name.as_bytes());
        mac.update(b"|");
        mac.update(timestamp.as_bytes());
        mac.update(b"|");
        mac.update(value.as_bytes());
        Ok(mac)
    }

    fn cipher(&self) -> Option<Result<Aes256Gcm, CodecError>> {
        self.block_key.map(|key| {
            Aes256Gcm::new_from_slice(&key).map_err(|e| CodecError::InvalidKey(e.to_string()))
        })
    }

    fn seal(&self, plain: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let Some(cipher) = self.cipher() else {
            return Ok(plain);
        };
        let cipher = cipher?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill(&mut nonce_bytes);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plain.as_slice())
            .map_err(|_| CodecError::Encrypt)?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);
        Ok(combined)
    }

    fn open(&self, sealed: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let Some(cipher) = self.cipher() else {
            return Ok(sealed);
        };
        let cipher = cipher?;

        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(CodecError::Decrypt);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CodecError::Decrypt)
    }
}

impl core::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyPair")
            .field("hash_key", &"<redacted>")
            .field("encrypting", &self.block_key.is_some())
            .finish()
    }
}

/// Ordered key-pairs: position 0 encodes, every position may decode.
#[derive(Debug, Clone)]
pub struct SecureCookieCodec {
    pairs: Vec<KeyPair>,
    max_age_secs: i64,
}

impl SecureCookieCodec {
    pub fn new(pairs: Vec<KeyPair>, max_age_secs: i64) -> Result<Self, CodecError> {
        if pairs.is_empty() {
            return Err(CodecError::NoKeys);
        }
        Ok(Self { pairs, max_age_secs })
    }

    pub fn max_age_secs(&self) -> i64 {
        self.max_age_secs
    }

    pub fn encode<T: Serialize>(&self, name: &str, value: &T) -> Result<String, CodecError> {
        self.encode_at(name, value, chrono::Utc::now().timestamp())
    }

    pub fn decode<T: DeserializeOwned>(&self, name: &str, token: &str) -> Result<T, CodecError> {
        self.decode_at(name, token, chrono::Utc::now().timestamp())
    }

    /// Encode with an explicit clock reading (unix seconds).
    pub fn encode_at<T: Serialize>(&self, name: &str, value: &T, now: i64) -> Result<String, CodecError> {
        let primary = self.pairs.first().ok_or(CodecError::NoKeys)?;

        let plain = serde_json::to_vec(value).map_err(|e| CodecError::Serialize(e.to_string()))?;
        let value = B64.encode(primary.seal(plain)?);
        let timestamp = now.to_string();
        let tag = primary.mac(name, &timestamp, &value)?.finalize().into_bytes();

        let mut raw = Vec::with_capacity(timestamp.len() + value.len() + tag.len() + 2);
        raw.extend_from_slice(timestamp.as_bytes());
        raw.push(b'|');
        raw.extend_from_slice(value.as_bytes());
        raw.push(b'|');
        raw.extend_from_slice(&tag);

        let token = B64.encode(raw);
        if token.len() > MAX_TOKEN_LEN {
            return Err(CodecError::TooLong);
        }
        Ok(token)
    }

    /// Decode with an explicit clock reading (unix seconds).
    ///
    /// Pairs are tried in order. When none verifies, the primary pair's error is returned.
    pub fn decode_at<T: DeserializeOwned>(&self, name: &str, token: &str, now: i64) -> Result<T, CodecError> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(CodecError::TooLong);
        }
        let raw = B64
            .decode(token)
            .map_err(|_| CodecError::Malformed("outer encoding"))?;

        let mut first_err = None;
        for pair in &self.pairs {
            match self.decode_with(pair, name, &raw, now) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        Err(first_err.unwrap_or(CodecError::NoKeys))
    }

    fn decode_with<T: DeserializeOwned>(
        &self,
        pair: &KeyPair,
        name: &str,
        raw: &[u8],
        now: i64,
    ) -> Result<T, CodecError> {
        let mut parts = raw.splitn(3, |b| *b == b'|');
        let (Some(timestamp), Some(value), Some(tag)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(CodecError::Malformed("expected three fields"));
        };
        let timestamp = core::str::from_utf8(timestamp).map_err(|_| CodecError::Malformed("timestamp"))?;
        let value = core::str::from_utf8(value).map_err(|_| CodecError::Malformed("value"))?;

        pair.mac(name, timestamp, value)?
            .verify_slice(tag)
            .map_err(|_| CodecError::InvalidMac)?;

        let issued: i64 = timestamp.parse().map_err(|_| CodecError::Malformed("timestamp"))?;
        if self.max_age_secs > 0 && issued < now.saturating_sub(self.max_age_secs) {
            return Err(CodecError::Expired);
        }
        if issued > now.saturating_add(MAX_CLOCK_SKEW_SECS) {
            return Err(CodecError::Expired);
        }

        let sealed = B64.decode(value).map_err(|_| CodecError::Malformed("value encoding"))?;
        let plain = pair.open(sealed)?;
        serde_json::from_slice(&plain).map_err(|e| CodecError::Deserialize(e.to_string()))
    }
}

/// `len` bytes from the OS RNG.
pub fn generate_random_key(len: usize) -> Vec<u8> {
    let mut key = vec![0u8; len];
    OsRng.fill_bytes(&mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const WEEK: i64 = 7 * 24 * 60 * 60;
    const NOW: i64 = 1_760_000_000;

    fn pair(seed: u8, encrypt: bool) -> KeyPair {
        KeyPair::new(vec![seed; 32], encrypt.then_some([seed.wrapping_add(1); 32])).unwrap()
    }

    fn codec(pairs: Vec<KeyPair>) -> SecureCookieCodec {
        SecureCookieCodec::new(pairs, WEEK).unwrap()
    }

    #[test]
    fn short_hash_keys_are_rejected() {
        assert!(matches!(KeyPair::new(vec![1u8; 31], None), Err(CodecError::InvalidKey(_))));
        assert_eq!(SecureCookieCodec::new(vec![], WEEK).unwrap_err(), CodecError::NoKeys);
    }

    #[test]
    fn encrypted_values_decode_and_hide_plaintext() {
        let c = codec(vec![pair(7, true)]);
        let token = c.encode_at("session", &"visible-key".to_string(), NOW).unwrap();
        let raw = String::from_utf8_lossy(&B64.decode(&token).unwrap()).into_owned();
        assert!(!raw.contains(&B64.encode(b"\"visible-key\"")));

        let back: String = c.decode_at("session", &token, NOW).unwrap();
        assert_eq!(back, "visible-key");
    }

    #[test]
    fn rotated_key_still_decodes() {
        let old = codec(vec![pair(1, true)]);
        let token = old.encode_at("session", &"abc".to_string(), NOW).unwrap();

        let rotated = codec(vec![pair(2, true), pair(1, true)]);
        let back: String = rotated.decode_at("session", &token, NOW).unwrap();
        assert_eq!(back, "abc");

        let fresh = rotated.encode_at("session", &"abc".to_string(), NOW).unwrap();
        assert_eq!(old.decode_at::<String>("session", &fresh, NOW), Err(CodecError::InvalidMac));
    }

    #[test]
    fn codec_without_encoding_pair_fails_cleanly() {
        let a = codec(vec![pair(1, false)]);
        let b = codec(vec![pair(9, false)]);
        let token = a.encode_at("session", &42u32, NOW).unwrap();
        assert_eq!(b.decode_at::<u32>("session", &token, NOW), Err(CodecError::InvalidMac));
    }

    #[test]
    fn same_hash_key_wrong_block_key_fails_decrypt() {
        let a = codec(vec![KeyPair::new(vec![3u8; 32], Some([4u8; 32])).unwrap()]);
        let b = codec(vec![KeyPair::new(vec![3u8; 32], Some([5u8; 32])).unwrap()]);
        let token = a.encode_at("session", &"k".to_string(), NOW).unwrap();
        assert_eq!(b.decode_at::<String>("session", &token, NOW), Err(CodecError::Decrypt));
    }

    #[test]
    fn cookie_name_is_bound() {
        let c = codec(vec![pair(1, false)]);
        let token = c.encode_at("session", &"k".to_string(), NOW).unwrap();
        assert_eq!(c.decode_at::<String>("other", &token, NOW), Err(CodecError::InvalidMac));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let c = codec(vec![pair(1, false)]);
        let token = c.encode_at("session", &"k".to_string(), NOW).unwrap();
        let mut raw = B64.decode(&token).unwrap();
        raw[0] = if raw[0] == b'1' { b'2' } else { b'1' };
        let forged = B64.encode(raw);
        assert_eq!(c.decode_at::<String>("session", &forged, NOW), Err(CodecError::InvalidMac));

        assert_eq!(
            c.decode_at::<String>("session", "not base64 !!", NOW),
            Err(CodecError::Malformed("outer encoding"))
        );
        assert_eq!(
            c.decode_at::<String>("session", &B64.encode(b"no-separators"), NOW),
            Err(CodecError::Malformed("expected three fields"))
        );
    }

    #[test]
    fn old_timestamps_expire() {
        let c = codec(vec![pair(1, false)]);
        let token = c.encode_at("session", &"k".to_string(), NOW - WEEK - 1).unwrap();
        assert_eq!(c.decode_at::<String>("session", &token, NOW), Err(CodecError::Expired));

        let token = c.encode_at("session", &"k".to_string(), NOW - WEEK + 60).unwrap();
        assert!(c.decode_at::<String>("session", &token, NOW).is_ok());
    }

    #[test]
    fn future_timestamps_beyond_skew_are_rejected() {
        let c = codec(vec![pair(1, false)]);
        let token = c.encode_at("session", &"k".to_string(), NOW + MAX_CLOCK_SKEW_SECS + 1).unwrap();
        assert_eq!(c.decode_at::<String>("session", &token, NOW), Err(CodecError::Expired));

        let token = c.encode_at("session", &"k".to_string(), NOW + MAX_CLOCK_SKEW_SECS).unwrap();
        assert!(c.decode_at::<String>("session", &token, NOW).is_ok());
    }

    #[test]
    fn mac_key_accepts_any_length_above_minimum() {
        let c = codec(vec![KeyPair::new(vec![6u8; 64], None).unwrap()]);
        let token = c.encode_at("session", &"k".to_string(), NOW).unwrap();
        assert_eq!(c.decode_at::<String>("session", &token, NOW), Ok("k".to_string()));
    }

    #[test]
    fn oversized_values_are_refused() {
        let c = codec(vec![pair(1, false)]);
        let big = "x".repeat(MAX_TOKEN_LEN);
        assert_eq!(c.encode_at("session", &big, NOW), Err(CodecError::TooLong));
        assert_eq!(
            c.decode_at::<String>("session", &"A".repeat(MAX_TOKEN_LEN + 1), NOW),
            Err(CodecError::TooLong)
        );
    }

    #[test]
    fn random_keys_have_requested_length_and_differ() {
        let a = generate_random_key(32);
        let b = generate_random_key(32);
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn any_key_string_survives_encoding(value in "[A-Za-z0-9_-]{0,64}", encrypt in any::<bool>()) {
            let c = codec(vec![pair(5, encrypt)]);
            let token = c.encode_at("session", &value, NOW).unwrap();
            let back: String = c.decode_at("session", &token, NOW).unwrap();
            prop_assert_eq!(back, value);
        }
    }
}

//! Continuation tokens.
//!
//! A token is the base64url encoding of a small camelCase JSON object that
//! carries everything needed to resume a batch, so the server keeps no
//! pagination state.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::{MemoryMode, Scope};
use crate::error::{Result, VaultError};

pub const TOKEN_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuationToken {
    pub v: u32,
    pub cursor: usize,
    pub scope: Scope,
    pub topic: Option<String>,
    pub max_docs: usize,
    pub max_chars_per_doc: usize,
    pub memory_mode: MemoryMode,
}

impl ContinuationToken {
    pub fn new(
        cursor: usize,
        scope: Scope,
        topic: Option<String>,
        max_docs: usize,
        max_chars_per_doc: usize,
        memory_mode: MemoryMode,
    ) -> Self {
        Self {
            v: TOKEN_VERSION,
            cursor,
            scope,
            topic,
            max_docs,
            max_chars_per_doc,
            memory_mode,
        }
    }

    pub fn encode(&self) -> String {
        // Serializing plain fields into a Vec cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode and validate. Padded input is accepted as well.
    pub fn decode(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let bytes = URL_SAFE_NO_PAD
            .decode(raw)
            .or_else(|_| URL_SAFE.decode(raw))
            .map_err(|e| VaultError::InvalidContinuationToken(format!("not base64url: {e}")))?;

        let token: ContinuationToken = serde_json::from_slice(&bytes)
            .map_err(|e| VaultError::InvalidContinuationToken(format!("malformed payload: {e}")))?;

        if token.v != TOKEN_VERSION {
            return Err(VaultError::InvalidContinuationToken(format!(
                "unsupported version {}",
                token.v
            )));
        }
        if token.max_docs < 1 || token.max_chars_per_doc < 200 {
            return Err(VaultError::InvalidContinuationToken(
                "batch limits out of range".to_string(),
            ));
        }
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ContinuationToken {
        ContinuationToken::new(
            3,
            Scope::Topic,
            Some("next.js".into()),
            5,
            300,
            MemoryMode::Both,
        )
    }

    #[test]
    fn test_decode_recovers_encoded_token() {
        let token = sample();
        assert_eq!(ContinuationToken::decode(&token.encode()).unwrap(), token);
    }

    #[test]
    fn test_wire_format_is_camel_case_json() {
        let raw = URL_SAFE_NO_PAD.decode(sample().encode()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json["v"], 1);
        assert_eq!(json["maxCharsPerDoc"], 300);
        assert_eq!(json["memoryMode"], "both");
        assert_eq!(json["scope"], "topic");
    }

    #[test]
    fn test_garbage_rejected() {
        for raw in ["invalid-token", "", "!!!", "eyJ2IjoxfQ"] {
            let err = ContinuationToken::decode(raw).unwrap_err();
            assert!(matches!(err, VaultError::InvalidContinuationToken(_)), "{raw}");
        }
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut token = sample();
        token.v = 2;
        assert!(ContinuationToken::decode(&token.encode()).is_err());
    }

    #[test]
    fn test_out_of_range_limits_rejected() {
        let mut token = sample();
        token.max_chars_per_doc = 100;
        assert!(ContinuationToken::decode(&token.encode()).is_err());
    }

    #[test]
    fn test_padded_input_accepted() {
        let token = sample();
        let json = serde_json::to_vec(&token).unwrap();
        let padded = URL_SAFE.encode(json);
        assert_eq!(ContinuationToken::decode(&padded).unwrap(), token);
    }
}

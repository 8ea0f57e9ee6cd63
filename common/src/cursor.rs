//! Opaque pagination cursors.
//!
//! A cursor carries the exact sort-key tuple of a boundary record, plus a
//! fingerprint of the sort order that produced it. The token is the JSON
//! payload encoded as URL-safe base64 without padding, so it can be dropped
//! into a query string unchanged.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::FieldValue;

const CURSOR_VERSION: u8 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("cursor is not valid base64")]
    Encoding,

    #[error("cursor payload is malformed")]
    Payload,

    #[error("unsupported cursor version {0}")]
    Version(u8),

    #[error("cursor carries no sort keys")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    /// Fingerprint of the sort order this cursor was issued for.
    pub sort: String,

    /// Sort-key values of the boundary record, tiebreaker last.
    pub keys: Vec<FieldValue>,
}

#[derive(Serialize, Deserialize)]
struct CursorPayload {
    v: u8,
    s: String,
    k: Vec<FieldValue>,
}

impl Cursor {
    pub fn new(sort: impl Into<String>, keys: Vec<FieldValue>) -> Self {
        Self {
            sort: sort.into(),
            keys,
        }
    }

    pub fn encode(&self) -> String {
        let payload = CursorPayload {
            v: CURSOR_VERSION,
            s: self.sort.clone(),
            k: self.keys.clone(),
        };

        // Serializing a struct of strings and tagged scalars cannot fail.
        let json = serde_json::to_vec(&payload).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| CursorError::Encoding)?;
        let payload: CursorPayload =
            serde_json::from_slice(&bytes).map_err(|_| CursorError::Payload)?;

        if payload.v != CURSOR_VERSION {
            return Err(CursorError::Version(payload.v));
        }
        if payload.k.is_empty() {
            return Err(CursorError::Empty);
        }

        Ok(Self {
            sort: payload.s,
            keys: payload.k,
        })
    }
}

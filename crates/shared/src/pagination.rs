//! Cursor utilities for incremental transcript reads.
//!
//! A cursor marks a position in a group's message log, which is ordered by
//! the server timestamp and then by the insertion sequence.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Error type for cursor operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("Invalid cursor format")]
    InvalidFormat,
    #[error("Invalid cursor encoding")]
    InvalidEncoding,
    #[error("Invalid timestamp in cursor")]
    InvalidTimestamp,
    #[error("Invalid sequence in cursor")]
    InvalidSequence,
}

/// Position of a message in a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageCursor {
    pub created_at: DateTime<Utc>,
    pub seq: i64,
}

impl MessageCursor {
    pub fn new(created_at: DateTime<Utc>, seq: i64) -> Self {
        Self { created_at, seq }
    }

    /// Encodes as `base64(RFC3339_timestamp|seq)`.
    pub fn encode(&self) -> String {
        let raw = format!(
            "{}|{}",
            self.created_at
                .to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            self.seq
        );
        URL_SAFE_NO_PAD.encode(raw.as_bytes())
    }

    pub fn decode(cursor: &str) -> Result<Self, CursorError> {
        let decoded = URL_SAFE_NO_PAD
            .decode(cursor)
            .map_err(|_| CursorError::InvalidEncoding)?;
        let s = String::from_utf8(decoded).map_err(|_| CursorError::InvalidFormat)?;

        let (timestamp_str, seq_str) = s.rsplit_once('|').ok_or(CursorError::InvalidFormat)?;

        let seq: i64 = seq_str.parse().map_err(|_| CursorError::InvalidSequence)?;
        let created_at = DateTime::parse_from_rfc3339(timestamp_str)
            .map_err(|_| CursorError::InvalidTimestamp)?
            .with_timezone(&Utc);

        Ok(Self { created_at, seq })
    }
}

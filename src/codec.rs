//! Byte/text conversion at the transport boundary
//!
//! Protocol messages are binary, the coordinator API is text. Every crossing
//! goes through [`encode`] / [`decode`] with an explicit [`Encoding`].

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur while converting between bytes and text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The input is not valid standard base64
    #[error("Invalid base64: {0}")]
    InvalidBase64(String),

    /// Bytes handed to the text encoding are not valid UTF-8
    #[error("Invalid text: {0}")]
    InvalidText(String),

    /// Wire value that names no known encoding
    #[error("Unexpected encoding [{0}], expected 1(Text) or 2(Base64)")]
    UnknownEncoding(i32),

    /// Name that matches no known encoding
    #[error("Unexpected encoding {0:?}, either \"text\" or \"base64\" should be used")]
    UnknownEncodingName(String),
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Transport encoding of a binary payload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Bytes are already text and pass through unchanged
    Text = 1,
    /// Standard alphabet, padded
    Base64 = 2,
}

impl TryFrom<i32> for Encoding {
    type Error = CodecError;

    fn try_from(value: i32) -> CodecResult<Self> {
        match value {
            1 => Ok(Encoding::Text),
            2 => Ok(Encoding::Base64),
            other => Err(CodecError::UnknownEncoding(other)),
        }
    }
}

impl FromStr for Encoding {
    type Err = CodecError;

    fn from_str(s: &str) -> CodecResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Encoding::Text),
            "base64" => Ok(Encoding::Base64),
            _ => Err(CodecError::UnknownEncodingName(s.to_string())),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Text => f.write_str("text"),
            Encoding::Base64 => f.write_str("base64"),
        }
    }
}

/// Convert bytes into transport text
pub fn encode(data: &[u8], encoding: Encoding) -> CodecResult<String> {
    match encoding {
        Encoding::Text => String::from_utf8(data.to_vec())
            .map_err(|e| CodecError::InvalidText(e.to_string())),
        Encoding::Base64 => Ok(BASE64.encode(data)),
    }
}

/// Convert transport text back into bytes
///
/// Base64 input is decoded strictly: no whitespace trimming, padding required.
pub fn decode(text: &str, encoding: Encoding) -> CodecResult<Vec<u8>> {
    match encoding {
        Encoding::Text => Ok(text.as_bytes().to_vec()),
        Encoding::Base64 => BASE64
            .decode(text)
            .map_err(|e| CodecError::InvalidBase64(e.to_string())),
    }
}

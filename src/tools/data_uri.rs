//! Data URI transport format
//!
//! Files travel between client and server as
//! `data:<mime>[;param=value...];base64,<payload>`.

use super::error::{ToolError, ToolResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};

const DEFAULT_MIME: &str = "text/plain";

/// A decoded data URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime: String,
    /// Optional `name=` parameter some clients attach
    pub name: Option<String>,
    pub data: Vec<u8>,
}

impl DataUri {
    pub fn new(mime: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            name: None,
            data,
        }
    }

    /// Parse a base64 data URI. Whitespace inside the payload is ignored.
    pub fn parse(input: &str) -> ToolResult<Self> {
        let input = input.trim();
        let rest = input
            .get(..5)
            .filter(|scheme| scheme.eq_ignore_ascii_case("data:"))
            .map(|_| &input[5..])
            .ok_or_else(|| ToolError::invalid("Expected a data URI starting with 'data:'"))?;

        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| ToolError::invalid("Malformed data URI: missing ','"))?;

        let mut parts = header.split(';').map(str::trim);
        let mime = parts.next().unwrap_or_default().to_ascii_lowercase();
        let mut is_base64 = false;
        let mut name = None;
        for part in parts {
            if part.eq_ignore_ascii_case("base64") {
                is_base64 = true;
            } else if let Some((key, value)) = part.split_once('=') {
                if key.trim().eq_ignore_ascii_case("name") {
                    name = urlencoding::decode(value.trim())
                        .map(|v| v.into_owned())
                        .ok()
                        .filter(|v| !v.is_empty());
                }
            }
        }
        if !is_base64 {
            return Err(ToolError::invalid("Only base64-encoded data URIs are supported"));
        }

        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        let data = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| ToolError::invalid(format!("Invalid base64 payload: {}", e)))?;

        Ok(Self {
            mime: if mime.is_empty() { DEFAULT_MIME.to_string() } else { mime },
            name,
            data,
        })
    }

    pub fn encode(&self) -> String {
        encode(&self.mime, &self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Build `data:<mime>;base64,<payload>`
pub fn encode(mime: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(data))
}

/// Decoded size of a base64 payload of `encoded_len` characters
pub fn decoded_len(encoded_len: usize) -> usize {
    encoded_len / 4 * 3
}

/// Characters needed to carry `bytes` as base64
pub fn encoded_len(bytes: usize) -> usize {
    bytes.div_ceil(3) * 4
}

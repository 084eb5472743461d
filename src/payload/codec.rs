//! Self-describing payload encoding
//!
//! A payload is a data URL: `data:<mime>;base64,<data>`. The MIME type travels
//! with the bytes, so a payload can be handed to a capability or an exporter
//! without any side metadata.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use std::fmt;
use std::sync::Arc;

use crate::error::{EngineError, Result};

const DATA_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// Standard alphabet; writes padding, accepts data with or without it
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// An encoded image payload. Clones share the same buffer.
///
/// The header is validated on construction, so the MIME type and data
/// section of a `Payload` are always available.
#[derive(Clone, PartialEq, Eq)]
pub struct Payload {
    text: Arc<str>,
    mime_end: usize,
    data_start: usize,
}

impl Payload {
    /// Wrap an already-encoded data URL after checking its header
    pub fn parse(encoded: impl Into<String>) -> Result<Self> {
        let encoded: String = encoded.into();
        let (mime_end, data_start) = split_header(&encoded)?;
        Ok(Self {
            text: Arc::from(encoded),
            mime_end,
            data_start,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Declared MIME type, e.g. "image/png"
    pub fn mime_type(&self) -> &str {
        &self.text[DATA_PREFIX.len()..self.mime_end]
    }

    fn data(&self) -> &str {
        &self.text[self.data_start..]
    }

    /// Length of the encoded text, not of the decoded bytes
    pub fn encoded_len(&self) -> usize {
        self.text.len()
    }
}

// Payloads are large; never dump them into logs.
impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("mime", &self.mime_type())
            .field("encoded_len", &self.encoded_len())
            .finish()
    }
}

/// Decoded form of a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPayload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Stateless encoder/decoder for [`Payload`]
pub struct PayloadCodec;

impl PayloadCodec {
    pub fn encode(mime_type: &str, bytes: &[u8]) -> Payload {
        let mime_end = DATA_PREFIX.len() + mime_type.len();
        let data_start = mime_end + BASE64_MARKER.len();
        let mut text = String::with_capacity(data_start + bytes.len() * 4 / 3 + 4);
        text.push_str(DATA_PREFIX);
        text.push_str(mime_type);
        text.push_str(BASE64_MARKER);
        PAYLOAD_ENGINE.encode_string(bytes, &mut text);
        Payload {
            text: Arc::from(text),
            mime_end,
            data_start,
        }
    }

    pub fn decode(payload: &Payload) -> Result<DecodedPayload> {
        let bytes = PAYLOAD_ENGINE
            .decode(payload.data().trim_end())
            .map_err(|e| EngineError::Codec(format!("invalid base64: {}", e)))?;
        Ok(DecodedPayload {
            mime_type: payload.mime_type().to_string(),
            bytes,
        })
    }

    /// Exact decoded byte length, computed from the base64 text length.
    ///
    /// Every 4 base64 characters carry 3 bytes; each trailing `=` removes one.
    /// Unpadded input (length 2 or 3 mod 4) rounds down correctly as well,
    /// and [`PayloadCodec::decode`] accepts it.
    pub fn byte_size(payload: &Payload) -> usize {
        let data = payload.data().trim_end();
        let padding = data.bytes().rev().take(2).take_while(|&b| b == b'=').count();
        (data.len() * 3 / 4).saturating_sub(padding)
    }
}

/// Returns (end of MIME type, start of base64 data) as byte offsets
fn split_header(encoded: &str) -> Result<(usize, usize)> {
    let rest = encoded
        .strip_prefix(DATA_PREFIX)
        .ok_or_else(|| EngineError::Codec("missing data: prefix".into()))?;
    let marker = rest
        .find(BASE64_MARKER)
        .ok_or_else(|| EngineError::Codec("missing ;base64, marker".into()))?;
    if marker == 0 {
        return Err(EngineError::Codec("empty MIME type".into()));
    }
    let mime_end = DATA_PREFIX.len() + marker;
    Ok((mime_end, mime_end + BASE64_MARKER.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_size_covers_every_padding_case() {
        // 3k, 3k+1 and 3k+2 bytes give zero, two and one padding characters
        for len in [0usize, 1, 2, 3, 4, 5, 6, 299, 300, 301] {
            let bytes: Vec<u8> = (0..len).map(|i| (i * 7) as u8).collect();
            let payload = PayloadCodec::encode("image/png", &bytes);
            assert_eq!(PayloadCodec::byte_size(&payload), len, "len {}", len);
        }
    }

    #[test]
    fn test_unpadded_data_sizes_and_decodes_alike() {
        for (data, expected) in [("QUI", &b"AB"[..]), ("QQ", &b"A"[..]), ("QUJD", &b"ABC"[..])] {
            let payload = Payload::parse(format!("data:image/png;base64,{}", data)).unwrap();
            let decoded = PayloadCodec::decode(&payload).unwrap();
            assert_eq!(decoded.bytes, expected, "{}", data);
            assert_eq!(PayloadCodec::byte_size(&payload), decoded.bytes.len(), "{}", data);
        }
    }

    #[test]
    fn test_decode_recovers_bytes_and_mime() {
        let payload = PayloadCodec::encode("image/jpeg", b"\xff\xd8hello\xff\xd9");
        let decoded = PayloadCodec::decode(&payload).unwrap();
        assert_eq!(decoded.mime_type, "image/jpeg");
        assert_eq!(decoded.bytes, b"\xff\xd8hello\xff\xd9");
        assert_eq!(payload.mime_type(), "image/jpeg");
    }

    #[test]
    fn test_malformed_payloads_rejected() {
        assert!(Payload::parse("image/png;base64,AAAA").is_err());
        assert!(Payload::parse("data:image/png,AAAA").is_err());
        assert!(Payload::parse("data:;base64,AAAA").is_err());

        let bad = Payload::parse("data:image/png;base64,@@@@").unwrap();
        assert!(matches!(PayloadCodec::decode(&bad), Err(EngineError::Codec(_))));
    }

    #[test]
    fn test_debug_hides_content() {
        let payload = PayloadCodec::encode("image/png", &[1, 2, 3]);
        let shown = format!("{:?}", payload);
        assert!(shown.contains("image/png"));
        assert!(!shown.contains("AQID"));
    }
}

//! Content-Transfer-Encoding decoding (RFC 2045 §6).
//!
//! Decoding never fails: malformed payloads decode on a best-effort basis,
//! since the charset stage still has to run on whatever comes out.

use std::borrow::Cow;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use tracing::debug;

/// Padding is stripped before decoding, and senders often leave junk in the
/// final sextet, so this engine is as forgiving as the crate allows.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// A declared `Content-Transfer-Encoding`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    QuotedPrintable,
    Base64,
    /// `7bit`, `8bit`, `binary`, absent, or anything unrecognized.
    #[default]
    Identity,
}

impl TransferEncoding {
    /// Map a header value onto an encoding. Unknown names are identity.
    pub fn from_name(name: Option<&str>) -> Self {
        let Some(name) = name else {
            return Self::Identity;
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "quoted-printable" => Self::QuotedPrintable,
            "base64" => Self::Base64,
            "7bit" | "8bit" | "binary" | "" => Self::Identity,
            other => {
                debug!(encoding = other, "Unknown transfer encoding, passing through");
                Self::Identity
            }
        }
    }

    /// Decode a raw payload.
    pub fn decode(self, raw: &[u8]) -> Cow<'_, [u8]> {
        match self {
            Self::QuotedPrintable => Cow::Owned(decode_quoted_printable(raw)),
            Self::Base64 => Cow::Owned(decode_base64(raw)),
            Self::Identity => Cow::Borrowed(raw),
        }
    }
}

/// Decode `raw` according to a `Content-Transfer-Encoding` header value.
pub fn decode<'a>(encoding_name: Option<&str>, raw: &'a [u8]) -> Cow<'a, [u8]> {
    TransferEncoding::from_name(encoding_name).decode(raw)
}

/// Lenient base64: whitespace and other non-alphabet bytes are skipped and
/// everything from the first `=` on is ignored.
pub fn decode_base64(raw: &[u8]) -> Vec<u8> {
    let mut clean: Vec<u8> = raw
        .iter()
        .copied()
        .take_while(|&b| b != b'=')
        .filter(|b| b.is_ascii_alphanumeric() || *b == b'+' || *b == b'/')
        .collect();

    // A lone trailing sextet cannot form a byte
    if clean.len() % 4 == 1 {
        clean.pop();
    }

    match LENIENT.decode(&clean) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "Base64 payload still malformed after cleanup");
            Vec::new()
        }
    }
}

/// Quoted-printable with soft line breaks. `=` not followed by two hex
/// digits is kept literally.
pub fn decode_quoted_printable(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        let b = raw[i];
        if b != b'=' {
            out.push(b);
            i += 1;
            continue;
        }

        if let (Some(hi), Some(lo)) = (
            raw.get(i + 1).and_then(|&c| hex_value(c)),
            raw.get(i + 2).and_then(|&c| hex_value(c)),
        ) {
            out.push((hi << 4) | lo);
            i += 3;
            continue;
        }

        if let Some(next) = soft_break_end(raw, i + 1) {
            i = next;
            continue;
        }

        out.push(b'=');
        i += 1;
    }

    out
}

/// If `=` at `start - 1` begins a soft line break (optional trailing blanks
/// then a line ending), return the index just past it.
fn soft_break_end(raw: &[u8], start: usize) -> Option<usize> {
    let mut j = start;
    while j < raw.len() && (raw[j] == b' ' || raw[j] == b'\t') {
        j += 1;
    }
    match raw.get(j) {
        Some(b'\n') => Some(j + 1),
        Some(b'\r') if raw.get(j + 1) == Some(&b'\n') => Some(j + 2),
        None => Some(j),
        _ => None,
    }
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

//! RFC 2231 extended parameter values.
//!
//! Handles the single extended form `name*=charset'lang'%XX...` and the
//! continuation form `name*0*=`, `name*1*=`, `name*2=`, ... Segments are
//! joined in index order, percent-decoded where marked with a trailing `*`,
//! and decoded with the charset from the first segment (UTF-8 when absent).
//!
//! Malformed extended values never fail the parse: the plain `name=` value
//! is used instead, or nothing at all.

use std::borrow::Cow;

use percent_encoding::percent_decode;
use thiserror::Error;
use tracing::debug;

use crate::parser::charset::Charset;

#[derive(Debug, Error, PartialEq, Eq)]
enum Malformed {
    #[error("invalid percent escape")]
    BadEscape,
    #[error("continuation segment {0} missing or duplicated")]
    OutOfOrder(usize),
    #[error("bad continuation index {0:?}")]
    BadIndex(String),
    #[error("value is not valid {0}")]
    Undecodable(String),
}

/// One `name*N[*]` piece.
struct Segment<'a> {
    index: usize,
    encoded: bool,
    value: &'a str,
}

/// Decode parameter `name` from a parsed parameter list.
///
/// Parameter names in `params` must be lower-case. Returns `None` when
/// neither an extended nor a plain value is usable.
pub fn decode_param(params: &[(String, String)], name: &str) -> Option<String> {
    match decode_extended(params, name) {
        Ok(Some(value)) => return Some(value),
        Ok(None) => {}
        Err(e) => debug!(param = name, error = %e, "Malformed RFC 2231 parameter, using plain value"),
    }

    params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.clone())
}

/// `Ok(None)` when there is no extended form of `name` at all.
fn decode_extended(params: &[(String, String)], name: &str) -> Result<Option<String>, Malformed> {
    let prefix = format!("{name}*");
    if let Some((_, value)) = params.iter().find(|(k, _)| *k == prefix) {
        let segment = Segment {
            index: 0,
            encoded: true,
            value,
        };
        return assemble(&[segment]).map(Some);
    }

    let mut segments = Vec::new();
    for (key, value) in params {
        let Some(rest) = key.strip_prefix(&prefix) else {
            continue;
        };
        let (digits, encoded) = match rest.strip_suffix('*') {
            Some(d) => (d, true),
            None => (rest, false),
        };
        let index = digits
            .parse::<usize>()
            .map_err(|_| Malformed::BadIndex(rest.to_string()))?;
        segments.push(Segment {
            index,
            encoded,
            value,
        });
    }

    if segments.is_empty() {
        return Ok(None);
    }
    segments.sort_by_key(|s| s.index);
    for (expected, segment) in segments.iter().enumerate() {
        if segment.index != expected {
            return Err(Malformed::OutOfOrder(expected));
        }
    }
    assemble(&segments).map(Some)
}

/// Join ordered segments into bytes and decode them with the declared charset.
fn assemble(segments: &[Segment<'_>]) -> Result<String, Malformed> {
    let mut charset_label = None;
    let mut bytes = Vec::new();

    for segment in segments {
        let mut value = segment.value;
        if segment.encoded && segment.index == 0 {
            let mut pieces = value.splitn(3, '\'');
            if let (Some(charset), Some(_lang), Some(rest)) =
                (pieces.next(), pieces.next(), pieces.next())
            {
                charset_label = Some(charset);
                value = rest;
            }
        }

        if segment.encoded {
            bytes.extend(percent_decode_strict(value)?.iter());
        } else {
            bytes.extend_from_slice(value.as_bytes());
        }
    }

    decode_bytes(charset_label, &bytes)
}

/// Percent-decode, rejecting `%` not followed by two hex digits.
fn percent_decode_strict(value: &str) -> Result<Cow<'_, [u8]>, Malformed> {
    let raw = value.as_bytes();
    for (i, &b) in raw.iter().enumerate() {
        if b == b'%' {
            let valid = raw
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return Err(Malformed::BadEscape);
            }
        }
    }
    Ok(percent_decode(raw).into())
}

/// Empty charset means UTF-8; an unknown one gets a UTF-8 attempt too.
fn decode_bytes(charset_label: Option<&str>, bytes: &[u8]) -> Result<String, Malformed> {
    let label = charset_label.map(str::trim).filter(|l| !l.is_empty());
    let charset = label
        .and_then(Charset::for_label)
        .unwrap_or(Charset::Encoded(encoding_rs::UTF_8));

    charset
        .decode_strict(bytes)
        .ok_or_else(|| Malformed::Undecodable(label.unwrap_or("utf-8").to_string()))
}

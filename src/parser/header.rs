//! RFC 5322 header handling: header/body split, folding, parameters,
//! encoded-words (RFC 2047), and date parsing.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use crate::parser::{charset, transfer};

/// Header fields of one message or MIME part, in original order.
///
/// Names are lower-cased; duplicates are preserved.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    fields: Vec<(String, String)>,
}

impl HeaderMap {
    /// Parse a raw header block (without the terminating blank line).
    pub fn parse(raw: &[u8]) -> Self {
        let text = header_text(raw);
        Self {
            fields: unfold(&text),
        }
    }

    /// First value for a header name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for a header name, in order.
    pub fn get_all<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a str> + use<'a, 'n> {
        self.fields
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether a header is present at all.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// A structured header value with parameters, such as `Content-Type` or
/// `Content-Disposition`.
///
/// `value` is lower-cased; parameter names are lower-cased and kept raw
/// (RFC 2231 `name*0*` segments are left for [`crate::parser::rfc2231`]).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamHeader {
    pub value: String,
    pub params: Vec<(String, String)>,
}

impl ParamHeader {
    /// Parse `value; name=token; other="quoted; string"`.
    pub fn parse(raw: &str) -> Self {
        let mut segments = split_unquoted(raw, ';').into_iter();
        // `text/plain (comment)`: the token ends at whitespace or a comment
        let value = segments
            .next()
            .and_then(|v| {
                v.split(|c: char| c.is_whitespace() || c == '(')
                    .find(|t| !t.is_empty())
            })
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let params = segments
            .filter_map(|segment| {
                let (name, val) = segment.split_once('=')?;
                let name = name.trim().to_ascii_lowercase();
                if name.is_empty() {
                    return None;
                }
                Some((name, unquote(val.trim())))
            })
            .collect();

        Self { value, params }
    }

    /// First parameter with this (lower-case) name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Top-level media type (`"text"` for `text/html`).
    pub fn main_type(&self) -> &str {
        self.value.split('/').next().unwrap_or("")
    }

    /// Media subtype (`"html"` for `text/html`).
    pub fn subtype(&self) -> &str {
        self.value.split_once('/').map(|(_, s)| s).unwrap_or("")
    }

    pub fn is_multipart(&self) -> bool {
        self.main_type() == "multipart"
    }
}

/// Split at `sep` outside double-quoted strings.
fn split_unquoted(raw: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, ch) in raw.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => {
                parts.push(&raw[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&raw[start..]);
    parts
}

/// Strip surrounding double quotes and resolve backslash escapes.
fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"') else {
        return value.to_string();
    };
    let inner = inner.strip_suffix('"').unwrap_or(inner);

    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                result.push(next);
            }
        } else {
            result.push(ch);
        }
    }
    result
}

/// Split a message or part into its header block and its body.
///
/// The blank separator line belongs to neither. Input whose first line is
/// not a header field has no headers; input without a blank line is all
/// headers.
pub fn split_header_body(data: &[u8]) -> (&[u8], &[u8]) {
    if !starts_with_field(data) {
        let body = data
            .strip_prefix(b"\r\n")
            .or_else(|| data.strip_prefix(b"\n"))
            .unwrap_or(data);
        return (&[], body);
    }

    let mut pos = 0;
    while pos < data.len() {
        let end = line_end(data, pos);
        let line = &data[pos..end];
        if line == b"\n" || line == b"\r\n" {
            return (&data[..pos], &data[end..]);
        }
        pos = end;
    }
    (data, &[])
}

/// Index just past the line that starts at `pos` (including its `\n`).
pub(crate) fn line_end(data: &[u8], pos: usize) -> usize {
    data[pos..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(data.len(), |i| pos + i + 1)
}

fn starts_with_field(data: &[u8]) -> bool {
    let first = &data[..line_end(data, 0)];
    match first.iter().position(|&b| b == b':') {
        Some(colon) if colon > 0 => first[..colon].iter().all(|b| b.is_ascii_graphic()),
        _ => false,
    }
}

/// Header bytes as text: UTF-8 when valid, else windows-1252, which
/// accepts every byte.
fn header_text(raw: &[u8]) -> String {
    String::from_utf8(raw.to_vec()).unwrap_or_else(|e| {
        encoding_rs::WINDOWS_1252
            .decode_without_bom_handling(e.as_bytes())
            .0
            .into_owned()
    })
}

/// Join folded continuation lines onto their field.
///
/// Lines that are neither a field nor a continuation are dropped.
fn unfold(text: &str) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        let folded = line.starts_with([' ', '\t']);
        match (folded, fields.last_mut()) {
            (true, Some((_, value))) => {
                value.push(' ');
                value.push_str(line.trim());
            }
            (true, None) => {}
            (false, _) => {
                if let Some((name, value)) = line.split_once(':') {
                    fields.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
                }
            }
        }
    }

    fields
}

/// Resolve RFC 2047 encoded-words (`=?charset?B|Q?text?=`) in a header value.
///
/// Anything that is not a well-formed encoded-word stays as written.
pub fn decode_encoded_words(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    let mut after_word = false;

    while let Some(pos) = rest.find("=?") {
        let (gap, candidate) = rest.split_at(pos);
        // RFC 2047 §6.2: blanks between adjacent encoded-words vanish
        if !(after_word && gap.trim().is_empty()) {
            out.push_str(gap);
        }

        let word = &candidate[2..];
        match decode_word(word) {
            Some((text, len)) => {
                out.push_str(&text);
                rest = &word[len..];
                after_word = true;
            }
            None => {
                out.push_str("=?");
                rest = word;
                after_word = false;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Decode `charset?enc?text?=` (the part after `=?`). Returns the text and
/// how many bytes of `word` it spans.
fn decode_word(word: &str) -> Option<(String, usize)> {
    let mut fields = word.splitn(3, '?');
    let label = fields.next()?;
    let encoding = fields.next()?;
    let payload_and_rest = fields.next()?;
    let payload = &payload_and_rest[..payload_and_rest.find("?=")?];

    let bytes = match encoding {
        "B" | "b" => transfer::decode_base64(payload.as_bytes()),
        "Q" | "q" => {
            let spaced: Vec<u8> = payload
                .bytes()
                .map(|b| if b == b'_' { b' ' } else { b })
                .collect();
            transfer::decode_quoted_printable(&spaced)
        }
        _ => return None,
    };

    // `utf-8*en`: the language tag is irrelevant here
    let charset_name = label.split_once('*').map_or(label, |(name, _)| name);
    let len = label.len() + encoding.len() + payload.len() + 4;
    Some((charset::resolve(Some(charset_name), &bytes), len))
}

/// The first `<id>` token of a Message-ID style header, or the trimmed value
/// when it has none.
pub fn msg_id(value: &str) -> String {
    msg_ids(value)
        .into_iter()
        .next()
        .unwrap_or_else(|| value.trim().to_string())
}

/// Every `<id>` token of a `References` style header, in order.
pub fn msg_ids(value: &str) -> Vec<String> {
    value
        .split('<')
        .skip(1)
        .filter_map(|chunk| chunk.split_once('>'))
        .map(|(id, _)| format!("<{id}>"))
        .collect()
}

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

const ZONE_OFFSETS: [(&str, &str); 11] = [
    ("UT", "+0000"),
    ("GMT", "+0000"),
    ("UTC", "+0000"),
    ("EST", "-0500"),
    ("EDT", "-0400"),
    ("CST", "-0600"),
    ("CDT", "-0500"),
    ("MST", "-0700"),
    ("MDT", "-0600"),
    ("PST", "-0800"),
    ("PDT", "-0700"),
];

/// Formats tried after RFC 2822 and RFC 3339, on the value without its weekday.
const LOOSE_DATE_FORMATS: [&str; 5] = [
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse a `Date` header. `None` when no known format matches.
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let parsed = DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_loose_date(value));
    if parsed.is_none() {
        debug!(date = value, "Unparsable Date header");
    }
    parsed
}

fn parse_loose_date(value: &str) -> Option<DateTime<Utc>> {
    let bare = drop_weekday(value);
    let numeric = numeric_zone(bare);

    let parsed = [bare, numeric.as_str()].into_iter().find_map(|candidate| {
        LOOSE_DATE_FORMATS.iter().find_map(|fmt| {
            DateTime::parse_from_str(candidate, fmt)
                .map(|dt| dt.with_timezone(&Utc))
                .or_else(|_| NaiveDateTime::parse_from_str(candidate, fmt).map(|n| n.and_utc()))
                .ok()
        })
    });
    parsed
}

/// `"Thu, 04 Jan ..."` and `"Thu 04 Jan ..."` become `"04 Jan ..."`.
fn drop_weekday(value: &str) -> &str {
    match value.split_once([',', ' ']) {
        Some((day, rest)) if WEEKDAYS.contains(&day) => rest.trim_start(),
        _ => value,
    }
}

/// Swap a trailing zone name (`EST`) for its numeric offset.
fn numeric_zone(value: &str) -> String {
    let Some((stamp, zone)) = value.rsplit_once(' ') else {
        return value.to_string();
    };
    ZONE_OFFSETS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(zone))
        .map_or_else(|| value.to_string(), |(_, offset)| format!("{stamp} {offset}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_map_preserves_duplicates() {
        let map = HeaderMap::parse(b"Received: a\nReceived: b\nSubject: Hi\n");
        let name = String::from("Received");
        assert_eq!(map.get(&name), Some("a"));
        assert_eq!(map.get_all(&name).count(), 2);
        assert_eq!(map.get_all("RECEIVED").collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(map.contains("subject"));
        assert!(!map.contains("content-type"));
    }

    #[test]
    fn test_folded_fields() {
        let map = HeaderMap::parse(
            b"Content-Type: multipart/alternative;\r\n\tboundary=\"abc\"\r\nX-Empty:\r\n",
        );
        assert_eq!(map.get("content-type"), Some("multipart/alternative; boundary=\"abc\""));
        assert_eq!(map.get("x-empty"), Some(""));
    }

    #[test]
    fn test_leading_continuation_and_junk_lines_dropped() {
        let fields = unfold("  orphan\nnot a field\nTo: a@b.com\n");
        assert_eq!(fields, vec![("to".to_string(), "a@b.com".to_string())]);
    }

    #[test]
    fn test_non_utf8_header_bytes() {
        let map = HeaderMap::parse(b"Subject: caf\xe9\n");
        assert_eq!(map.get("subject"), Some("café"));
    }

    #[test]
    fn test_split_header_body_lf() {
        let (headers, body) = split_header_body(b"From: a@b.com\nSubject: Hi\n\nBody\n");
        assert_eq!(headers, b"From: a@b.com\nSubject: Hi\n");
        assert_eq!(body, b"Body\n");
    }

    #[test]
    fn test_split_header_body_crlf() {
        let (headers, body) = split_header_body(b"From: a@b.com\r\nSubject: Hi\r\n\r\nBody\r\n");
        assert_eq!(headers, b"From: a@b.com\r\nSubject: Hi\r\n");
        assert_eq!(body, b"Body\r\n");
    }

    #[test]
    fn test_split_header_body_without_headers() {
        let (headers, body) = split_header_body(b"\nonly a body");
        assert!(headers.is_empty());
        assert_eq!(body, b"only a body");

        let (headers, body) = split_header_body(b"not a header line\nmore");
        assert!(headers.is_empty());
        assert_eq!(body, b"not a header line\nmore");
    }

    #[test]
    fn test_split_header_body_headers_only() {
        let (headers, body) = split_header_body(b"Content-Type: text/plain\n");
        assert_eq!(headers, b"Content-Type: text/plain\n");
        assert!(body.is_empty());
    }

    #[test]
    fn test_param_header_basic() {
        let ct = ParamHeader::parse("Text/HTML; charset=\"UTF-8\"; format=flowed");
        assert_eq!(ct.value, "text/html");
        assert_eq!(ct.main_type(), "text");
        assert_eq!(ct.subtype(), "html");
        assert_eq!(ct.param("charset"), Some("UTF-8"));
        assert_eq!(ct.param("format"), Some("flowed"));
        assert!(!ct.is_multipart());
    }

    #[test]
    fn test_param_header_drops_comment_after_value() {
        let ct = ParamHeader::parse("text/plain (plain text); charset=us-ascii");
        assert_eq!(ct.value, "text/plain");
        assert_eq!(ct.param("charset"), Some("us-ascii"));
        assert_eq!(ParamHeader::parse(" inline(shown)").value, "inline");
        assert_eq!(ParamHeader::parse("").value, "");
    }

    #[test]
    fn test_param_header_quoted_semicolon_and_escape() {
        let cd = ParamHeader::parse(r#"attachment; filename="a;b \"c\".txt"; size=10"#);
        assert_eq!(cd.value, "attachment");
        assert_eq!(cd.param("filename"), Some(r#"a;b "c".txt"#));
        assert_eq!(cd.param("size"), Some("10"));
    }

    #[test]
    fn test_param_header_keeps_extended_names() {
        let cd = ParamHeader::parse("attachment; filename*0*=UTF-8''a; FILENAME*1*=b");
        assert_eq!(cd.param("filename*0*"), Some("UTF-8''a"));
        assert_eq!(cd.param("filename*1*"), Some("b"));
    }

    #[test]
    fn test_param_header_skips_naked_params() {
        let ct = ParamHeader::parse("multipart/mixed; bogus; boundary=xyz");
        assert!(ct.is_multipart());
        assert_eq!(ct.params.len(), 1);
        assert_eq!(ct.param("boundary"), Some("xyz"));
    }

    #[test]
    fn test_encoded_word_b() {
        assert_eq!(decode_encoded_words("=?utf-8?b?w7xiZXI=?="), "über");
    }

    #[test]
    fn test_encoded_word_q_with_underscores() {
        assert_eq!(
            decode_encoded_words("=?iso-8859-1?Q?Gr=FC=DFe_aus_Berlin?="),
            "Grüße aus Berlin"
        );
    }

    #[test]
    fn test_adjacent_encoded_words_join() {
        let input = "=?UTF-8?Q?multi?=\r\n =?UTF-8?Q?part?= tail";
        assert_eq!(decode_encoded_words(input), "multipart tail");
    }

    #[test]
    fn test_encoded_word_between_plain_text() {
        assert_eq!(decode_encoded_words("Fwd: =?UTF-8?Q?r=C3=A9sum=C3=A9?= v2"), "Fwd: résumé v2");
    }

    #[test]
    fn test_encoded_word_with_language() {
        assert_eq!(decode_encoded_words("=?UTF-8*en?Q?Hi_there?="), "Hi there");
    }

    #[test]
    fn test_broken_encoded_word_is_kept() {
        assert_eq!(decode_encoded_words("=?UTF-8?X?abc?="), "=?UTF-8?X?abc?=");
        assert_eq!(decode_encoded_words("price =? unknown"), "price =? unknown");
    }

    #[test]
    fn test_parse_date_rfc2822() {
        let dt = parse_date("Mon, 15 Jul 2024 08:30:00 +0200").expect("date");
        assert_eq!(dt.to_rfc3339(), "2024-07-15T06:30:00+00:00");
    }

    #[test]
    fn test_parse_date_loose_forms() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 EST").expect("named zone");
        assert_eq!(dt.format("%H").to_string(), "15");

        let dt = parse_date("Thu 4 Jan 2024 10:00 +0000").expect("no seconds");
        assert_eq!(dt.format("%d %H:%M").to_string(), "04 10:00");

        let dt = parse_date("2024-01-04 10:00:00").expect("naive");
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2024-01-04");
    }

    #[test]
    fn test_parse_date_rfc3339() {
        assert!(parse_date("2024-01-04T10:00:00Z").is_some());
    }

    #[test]
    fn test_parse_date_garbage() {
        assert!(parse_date("   ").is_none());
        assert!(parse_date("yesterday-ish").is_none());
    }

    #[test]
    fn test_msg_ids() {
        assert_eq!(msg_id("  <first@pm.me> (comment)"), "<first@pm.me>");
        assert_eq!(msg_id("bare-id@pm.me "), "bare-id@pm.me");
        assert_eq!(
            msg_ids("<a@pm.me>\r\n <b@pm.me> <broken"),
            vec!["<a@pm.me>", "<b@pm.me>"]
        );
        assert!(msg_ids("").is_empty());
    }
}

//! MIME structure: the part tree and the walker that classifies its leaves.
//!
//! The tree borrows the raw message; only decoded text and attachment
//! payloads are owned, so it can be dropped as soon as the walk is done.

use tracing::{debug, warn};

use crate::config::ParserConfig;
use crate::model::attachment::{Attachment, Disposition};
use crate::parser::header::{self, HeaderMap, ParamHeader};
use crate::parser::{charset, rfc2231, transfer};

/// Headers of one part, with the fields the walker needs already parsed.
#[derive(Debug, Clone, Default)]
pub struct PartHeaders {
    pub fields: HeaderMap,
    pub content_type: Option<ParamHeader>,
    pub disposition: Option<ParamHeader>,
    pub transfer_encoding: Option<String>,
    /// Content-ID without angle brackets.
    pub content_id: Option<String>,
}

impl PartHeaders {
    pub fn parse(raw: &[u8]) -> Self {
        let fields = HeaderMap::parse(raw);
        let content_type = fields.get("content-type").map(ParamHeader::parse);
        let disposition = fields.get("content-disposition").map(ParamHeader::parse);
        let transfer_encoding = fields.get("content-transfer-encoding").map(str::to_string);
        let content_id = fields
            .get("content-id")
            .map(|id| id.trim().trim_start_matches('<').trim_end_matches('>').trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        Self {
            fields,
            content_type,
            disposition,
            transfer_encoding,
            content_id,
        }
    }

    /// Declared media type, `text/plain` when absent or empty (RFC 2045 §5.2).
    pub fn media_type(&self) -> &str {
        match self.content_type.as_ref() {
            Some(ct) if !ct.value.is_empty() => &ct.value,
            _ => "text/plain",
        }
    }

    pub fn charset(&self) -> Option<&str> {
        self.content_type.as_ref()?.param("charset")
    }

    fn is_attachment_disposition(&self) -> bool {
        self.disposition
            .as_ref()
            .is_some_and(|d| d.value == Disposition::Attachment.as_str())
    }

    /// Whether any filename is declared, plain or RFC 2231 extended.
    fn has_filename(&self) -> bool {
        let declares = |header: Option<&ParamHeader>, name: &str| {
            header.is_some_and(|h| {
                h.params.iter().any(|(k, _)| {
                    k == name || k.strip_prefix(name).is_some_and(|rest| rest.starts_with('*'))
                })
            })
        };
        declares(self.disposition.as_ref(), "filename") || declares(self.content_type.as_ref(), "name")
    }

    fn has_type_signal(&self) -> bool {
        self.content_type.is_some() || self.disposition.is_some()
    }
}

/// One node of the MIME tree.
#[derive(Debug)]
pub enum MimePart<'a> {
    Leaf {
        headers: PartHeaders,
        body: &'a [u8],
    },
    Multipart {
        headers: PartHeaders,
        subtype: String,
        boundary: Option<String>,
        children: Vec<MimePart<'a>>,
    },
}

impl<'a> MimePart<'a> {
    /// Parse a complete part (headers and body).
    pub fn parse(data: &'a [u8], max_depth: usize) -> Self {
        Self::parse_at(data, 0, max_depth)
    }

    /// Build the root node from an already split header block and body.
    pub fn with_headers(headers: PartHeaders, body: &'a [u8], max_depth: usize) -> Self {
        Self::build(headers, body, 0, max_depth)
    }

    fn parse_at(data: &'a [u8], depth: usize, max_depth: usize) -> Self {
        let (head, body) = header::split_header_body(data);
        Self::build(PartHeaders::parse(head), body, depth, max_depth)
    }

    fn build(headers: PartHeaders, body: &'a [u8], depth: usize, max_depth: usize) -> Self {
        let Some(ct) = headers.content_type.as_ref().filter(|ct| ct.is_multipart()) else {
            return Self::Leaf { headers, body };
        };
        let subtype = ct.subtype().to_string();
        let boundary = ct
            .param("boundary")
            .filter(|b| !b.is_empty())
            .map(str::to_string);

        let children = match &boundary {
            _ if depth >= max_depth.max(1) => {
                warn!(depth, subtype = %subtype, "Multipart nested too deep, skipping subtree");
                Vec::new()
            }
            Some(boundary) => split_multipart(body, boundary)
                .into_iter()
                .map(|part| Self::parse_at(part, depth + 1, max_depth))
                .collect(),
            None => {
                debug!(subtype = %subtype, "Multipart without boundary");
                Vec::new()
            }
        };

        Self::Multipart {
            headers,
            subtype,
            boundary,
            children,
        }
    }

    pub fn headers(&self) -> &PartHeaders {
        match self {
            Self::Leaf { headers, .. } | Self::Multipart { headers, .. } => headers,
        }
    }
}

/// Split a multipart body at `--boundary` delimiter lines.
///
/// The line break before each delimiter belongs to the delimiter. Preamble
/// and epilogue are dropped; a part left open by a missing close delimiter
/// runs to the end of the body.
pub fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let mut parts = Vec::new();
    let mut current: Option<usize> = None;
    let mut pos = 0;

    while pos < body.len() {
        let end = header::line_end(body, pos);
        if let Some(rest) = body[pos..end].strip_prefix(delimiter.as_bytes()) {
            let closing = rest.starts_with(b"--");
            let tail = if closing { &rest[2..] } else { rest };
            if tail.iter().all(u8::is_ascii_whitespace) {
                if let Some(start) = current.take() {
                    parts.push(strip_line_break(&body[start..pos]));
                }
                if closing {
                    return parts;
                }
                current = Some(end);
            }
        }
        pos = end;
    }

    if let Some(start) = current {
        debug!(boundary, "Multipart has no close delimiter");
        parts.push(strip_line_break(&body[start..]));
    }
    parts
}

fn strip_line_break(data: &[u8]) -> &[u8] {
    data.strip_suffix(b"\r\n")
        .or_else(|| data.strip_suffix(b"\n"))
        .unwrap_or(data)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Plain,
    Html,
}

/// Decoded text of one body leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyText {
    pub kind: BodyKind,
    pub text: String,
}

/// What a leaf contributes to the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Body(BodyKind),
    Attachment,
    Skipped,
}

/// Result of walking a (sub)tree.
///
/// `rich` feeds the message body, `plain` the plaintext body. They differ
/// only below a `multipart/alternative`, where each may come from a
/// different rendering.
#[derive(Debug, Default)]
pub struct Walked {
    pub rich: Vec<BodyText>,
    pub plain: Vec<BodyText>,
    pub attachments: Vec<Attachment>,
}

impl Walked {
    pub fn has_html(&self) -> bool {
        self.rich.iter().any(|b| b.kind == BodyKind::Html)
    }

    fn has_body(&self) -> bool {
        !self.rich.is_empty()
    }

    fn is_plain_only(&self) -> bool {
        !self.plain.is_empty() && self.plain.iter().all(|b| b.kind == BodyKind::Plain)
    }

    fn append(&mut self, other: Walked) {
        self.rich.extend(other.rich);
        self.plain.extend(other.plain);
        self.attachments.extend(other.attachments);
    }
}

/// Decide what a leaf is.
///
/// The root leaf always has a type (`text/plain` by default). Nested leaves
/// with neither `Content-Type` nor `Content-Disposition` are skipped.
pub fn classify(headers: &PartHeaders, is_root: bool) -> Classification {
    if !is_root && !headers.has_type_signal() {
        return Classification::Skipped;
    }
    let kind = match headers.media_type() {
        "text/plain" => BodyKind::Plain,
        "text/html" => BodyKind::Html,
        _ => return Classification::Attachment,
    };
    if headers.is_attachment_disposition() || headers.has_filename() {
        Classification::Attachment
    } else {
        Classification::Body(kind)
    }
}

/// Walks a MIME tree and collects bodies and attachments.
pub struct Walker<'c> {
    config: &'c ParserConfig,
}

impl<'c> Walker<'c> {
    pub fn new(config: &'c ParserConfig) -> Self {
        Self { config }
    }

    pub fn walk(&self, root: &MimePart<'_>) -> Walked {
        self.walk_part(root, true)
    }

    fn walk_part(&self, part: &MimePart<'_>, is_root: bool) -> Walked {
        match part {
            MimePart::Leaf { headers, body } => self.walk_leaf(headers, body, is_root),
            MimePart::Multipart {
                subtype, children, ..
            } => {
                let walked = children.iter().map(|child| self.walk_part(child, false));
                match subtype.as_str() {
                    "alternative" => select_alternative(walked.collect()),
                    _ => walked.fold(Walked::default(), |mut acc, child| {
                        acc.append(child);
                        acc
                    }),
                }
            }
        }
    }

    fn walk_leaf(&self, headers: &PartHeaders, body: &[u8], is_root: bool) -> Walked {
        let mut walked = Walked::default();
        match classify(headers, is_root) {
            Classification::Body(kind) => {
                let decoded = transfer::decode(headers.transfer_encoding.as_deref(), body);
                let text = BodyText {
                    kind,
                    text: charset::resolve(headers.charset(), &decoded),
                };
                walked.rich.push(text.clone());
                walked.plain.push(text);
            }
            Classification::Attachment => {
                walked.attachments.push(self.build_attachment(headers, body));
            }
            Classification::Skipped => {
                debug!(size = body.len(), "Skipping part without type or disposition");
            }
        }
        walked
    }

    fn build_attachment(&self, headers: &PartHeaders, body: &[u8]) -> Attachment {
        let data = transfer::decode(headers.transfer_encoding.as_deref(), body).into_owned();
        let disposition = match headers.disposition.as_ref().map(|d| d.value.as_str()) {
            Some(value) if value == Disposition::Inline.as_str() => Disposition::Inline,
            Some(_) => Disposition::Attachment,
            None if headers.content_id.is_some() => Disposition::Inline,
            None => Disposition::Attachment,
        };

        Attachment::new(
            attachment_name(headers, &self.config.default_attachment_name),
            headers.media_type().to_string(),
            disposition,
            headers.content_id.clone(),
            data,
        )
    }
}

/// Keep one rendering of a `multipart/alternative`.
///
/// The rich body (and the attachments) come from the last alternative
/// holding HTML, else the last one holding any body, else the last one.
/// The plaintext body comes from the last purely plaintext alternative,
/// else from the same alternative as the rich body.
fn select_alternative(mut alternatives: Vec<Walked>) -> Walked {
    let Some(last) = alternatives.len().checked_sub(1) else {
        return Walked::default();
    };
    let rich_idx = alternatives
        .iter()
        .rposition(Walked::has_html)
        .or_else(|| alternatives.iter().rposition(Walked::has_body))
        .unwrap_or(last);
    let plain_idx = alternatives
        .iter()
        .rposition(Walked::is_plain_only)
        .unwrap_or(rich_idx);

    let plain = std::mem::take(&mut alternatives[plain_idx].plain);
    let chosen = &mut alternatives[rich_idx];
    Walked {
        rich: std::mem::take(&mut chosen.rich),
        plain,
        attachments: std::mem::take(&mut chosen.attachments),
    }
}

/// Filename from `Content-Disposition`, then `Content-Type; name=`, then
/// the configured default.
fn attachment_name(headers: &PartHeaders, default_name: &str) -> String {
    let name = headers
        .disposition
        .as_ref()
        .and_then(|d| rfc2231::decode_param(&d.params, "filename"))
        .or_else(|| {
            headers
                .content_type
                .as_ref()
                .and_then(|ct| rfc2231::decode_param(&ct.params, "name"))
        })
        .map(|name| {
            if name.contains("=?") {
                header::decode_encoded_words(&name)
            } else {
                name
            }
        })
        .unwrap_or_default();

    match name.trim() {
        "" => default_name.to_string(),
        trimmed => trimmed.to_string(),
    }
}

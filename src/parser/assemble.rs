//! Message assembly: envelope fields, bodies, and attachments merged into
//! one [`ParsedMessage`].

use std::borrow::Cow;

use tracing::debug;

use crate::config::ParserConfig;
use crate::error::{ParseError, Result};
use crate::model::address::EmailAddress;
use crate::model::attachment::{Attachment, Disposition};
use crate::model::message::ParsedMessage;
use crate::parser::header::{self, HeaderMap};
use crate::parser::html;
use crate::parser::mime::{BodyKind, BodyText, MimePart, PartHeaders, Walker};

/// An armored public key supplied by the caller, attached after the MIME
/// attachments.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicKey<'a> {
    pub armored: &'a str,
    pub name: &'a str,
}

/// Parse `message` (already stripped of mbox framing) into a [`ParsedMessage`].
pub fn assemble(
    message: &[u8],
    public_key: PublicKey<'_>,
    config: &ParserConfig,
) -> Result<ParsedMessage> {
    let (head, body) = header::split_header_body(message);
    let root = MimePart::with_headers(PartHeaders::parse(head), body, config.max_depth);
    let fields = &root.headers().fields;

    let Some(raw_from) = fields.get("from") else {
        return Err(ParseError::MissingSender);
    };
    let sender = EmailAddress::parse_list(raw_from)
        .into_iter()
        .next()
        .ok_or_else(|| ParseError::InvalidSender(raw_from.to_string()))?;

    if let MimePart::Multipart {
        boundary, children, ..
    } = &root
    {
        if children.is_empty() {
            return Err(ParseError::MalformedMultipart {
                boundary: boundary.clone(),
            });
        }
    }

    let walked = Walker::new(config).walk(&root);
    let body_mime_type = if walked.has_html() {
        "text/html"
    } else {
        "text/plain"
    };
    let body = join_bodies(&walked.rich, &config.body_separator, false);
    let plain_body = join_bodies(&walked.plain, &config.body_separator, true);

    let mut attachments = walked.attachments;
    if !public_key.armored.is_empty() {
        if has_content_type(fields) {
            attachments.push(key_attachment(public_key, config));
        } else {
            debug!("Root part has no Content-Type, public key not attached");
        }
    }

    debug!(
        body_len = body.len(),
        attachments = attachments.len(),
        html = body_mime_type == "text/html",
        "Message assembled"
    );

    Ok(ParsedMessage {
        sender,
        recipients: addresses(fields, "to"),
        cc: addresses(fields, "cc"),
        bcc: addresses(fields, "bcc"),
        reply_to: addresses(fields, "reply-to"),
        subject: fields
            .get("subject")
            .map(header::decode_encoded_words)
            .unwrap_or_default(),
        date: fields.get("date").and_then(header::parse_date),
        message_id: fields
            .get("message-id")
            .map(header::msg_id)
            .unwrap_or_default(),
        in_reply_to: fields.get("in-reply-to").map(header::msg_id),
        references: fields
            .get("references")
            .map(header::msg_ids)
            .unwrap_or_default(),
        body,
        body_mime_type: body_mime_type.to_string(),
        plain_body,
        attachments,
    })
}

/// Every mailbox of every `name` header, in header order.
fn addresses(fields: &HeaderMap, name: &str) -> Vec<EmailAddress> {
    fields
        .get_all(name)
        .flat_map(EmailAddress::parse_list)
        .collect()
}

/// Join body pieces; with `render_html`, HTML pieces become plaintext first.
fn join_bodies(pieces: &[BodyText], separator: &str, render_html: bool) -> String {
    pieces
        .iter()
        .map(|piece| match piece.kind {
            BodyKind::Html if render_html => Cow::Owned(html::render(&piece.text)),
            _ => Cow::Borrowed(piece.text.as_str()),
        })
        .collect::<Vec<_>>()
        .join(separator)
}

/// The key is only attached to messages whose root declares a content type.
fn has_content_type(fields: &HeaderMap) -> bool {
    fields
        .get("content-type")
        .is_some_and(|value| !value.trim().is_empty())
}

fn key_attachment(key: PublicKey<'_>, config: &ParserConfig) -> Attachment {
    let name = key.name.trim();
    let name = if name.is_empty() {
        config.default_attachment_name.clone()
    } else if name.to_ascii_lowercase().ends_with(".asc") {
        name.to_string()
    } else {
        format!("{name}.asc")
    };

    Attachment::new(
        name,
        config.public_key_mime_type.clone(),
        Disposition::Attachment,
        None,
        key.armored.as_bytes().to_vec(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &[u8]) -> Result<ParsedMessage> {
        assemble(raw, PublicKey::default(), &ParserConfig::default())
    }

    #[test]
    fn test_missing_from() {
        let err = parse(b"To: a@b.com\nContent-Type: text/plain\n\nbody").unwrap_err();
        assert!(matches!(err, ParseError::MissingSender));
    }

    #[test]
    fn test_empty_from_is_invalid() {
        let err = parse(b"From: \nTo: a@b.com\n\nbody").unwrap_err();
        assert!(matches!(err, ParseError::InvalidSender(_)));
    }

    #[test]
    fn test_envelope_fields() {
        let raw = b"From: \"Sender\" <sender@pm.me>\n\
To: a@b.com, \"Bee\" <b@b.com>\n\
Cc: c@b.com\n\
Reply-To: r@b.com\n\
Subject: =?UTF-8?Q?caf=C3=A9?=\n\
Date: Thu, 04 Jan 2024 10:00:00 +0000\n\
Message-ID: <id1@pm.me>\n\
In-Reply-To: <id0@pm.me>\n\
References: <a@pm.me> <id0@pm.me>\n\
\n\
body";
        let msg = parse(raw).unwrap();
        assert_eq!(msg.sender.display_name, "Sender");
        assert_eq!(msg.sender.address, "sender@pm.me");
        assert_eq!(msg.recipients.len(), 2);
        assert_eq!(msg.recipients[1].display_name, "Bee");
        assert_eq!(msg.cc[0].address, "c@b.com");
        assert!(msg.bcc.is_empty());
        assert_eq!(msg.reply_to[0].address, "r@b.com");
        assert_eq!(msg.subject, "café");
        assert!(msg.date.is_some());
        assert_eq!(msg.message_id, "<id1@pm.me>");
        assert_eq!(msg.in_reply_to.as_deref(), Some("<id0@pm.me>"));
        assert_eq!(msg.references, vec!["<a@pm.me>", "<id0@pm.me>"]);
        assert_eq!(msg.body, "body");
        assert_eq!(msg.plain_body, "body");
        assert!(!msg.is_html());
    }

    #[test]
    fn test_repeated_address_headers_are_concatenated() {
        let raw = b"From: s@pm.me\nTo: a@b.com\nTo: \"Bee\" <b@b.com>, c@b.com\n\nbody";
        let msg = parse(raw).unwrap();
        let to: Vec<&str> = msg.recipients.iter().map(|a| a.address.as_str()).collect();
        assert_eq!(to, vec!["a@b.com", "b@b.com", "c@b.com"]);
        assert_eq!(msg.recipients[1].display_name, "Bee");
    }

    #[test]
    fn test_zero_max_depth_parses_multipart() {
        let raw = b"From: s@pm.me\nContent-Type: multipart/mixed; boundary=b\n\n--b\nContent-Type: text/plain\n\nhello\n--b--\n";
        let config = ParserConfig {
            max_depth: 0,
            ..ParserConfig::default()
        };
        let msg = assemble(raw, PublicKey::default(), &config).unwrap();
        assert_eq!(msg.body, "hello");
    }

    #[test]
    fn test_html_only_plain_body_is_rendered() {
        let raw = b"From: s@pm.me\nContent-Type: text/html\n\n<p>Hi <b>there</b></p>";
        let msg = parse(raw).unwrap();
        assert!(msg.is_html());
        assert_eq!(msg.body, "<p>Hi <b>there</b></p>");
        assert_eq!(msg.plain_body, "Hi *there*");
    }

    #[test]
    fn test_multipart_without_parts_is_fatal() {
        let raw = b"From: s@pm.me\nContent-Type: multipart/mixed; boundary=zz\n\nno delimiters\n";
        match parse(raw).unwrap_err() {
            ParseError::MalformedMultipart { boundary } => {
                assert_eq!(boundary.as_deref(), Some("zz"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_public_key_needs_root_content_type() {
        let key = PublicKey {
            armored: "-----BEGIN PGP PUBLIC KEY BLOCK-----",
            name: "alice",
        };
        let config = ParserConfig::default();

        let typed = b"From: s@pm.me\nContent-Type: text/plain\n\nbody";
        let mut msg = assemble(typed, key, &config).unwrap();
        assert_eq!(msg.attachments.len(), 1);
        let att = &mut msg.attachments[0];
        assert_eq!(att.name, "alice.asc");
        assert_eq!(att.mime_type, "application/pgp-keys");
        assert_eq!(att.disposition, Disposition::Attachment);
        assert_eq!(
            att.content.read_all().unwrap(),
            b"-----BEGIN PGP PUBLIC KEY BLOCK-----"
        );

        let untyped = b"From: s@pm.me\n\nbody";
        let msg = assemble(untyped, key, &config).unwrap();
        assert!(msg.attachments.is_empty());
    }

    #[test]
    fn test_key_attachment_names() {
        let config = ParserConfig::default();
        let named = |name| {
            key_attachment(
                PublicKey {
                    armored: "k",
                    name,
                },
                &config,
            )
            .name
        };
        assert_eq!(named("bob.ASC"), "bob.ASC");
        assert_eq!(named("  "), "attachment.bin");
        assert_eq!(named("carol"), "carol.asc");
    }

    #[test]
    fn test_custom_separator() {
        let raw = b"From: s@pm.me\nContent-Type: multipart/mixed; boundary=b\n\n--b\nContent-Type: text/plain\n\none\n--b\nContent-Type: text/plain\n\ntwo\n--b--\n";
        let config = ParserConfig {
            body_separator: "\n\n".to_string(),
            ..ParserConfig::default()
        };
        let msg = assemble(raw, PublicKey::default(), &config).unwrap();
        assert_eq!(msg.body, "one\n\ntwo");
    }
}

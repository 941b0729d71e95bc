//! The decoded message record.

use chrono::{DateTime, Utc};

use super::address::EmailAddress;
use super::attachment::Attachment;

/// Everything a mail consumer needs from one raw message.
///
/// `body` and `plain_body` are always present (possibly empty) and always
/// derive from the same selected part(s) of the MIME tree.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ParsedMessage {
    /// Sender (first mailbox of the `From:` header).
    pub sender: EmailAddress,

    /// Primary recipients (`To:`), in header order.
    pub recipients: Vec<EmailAddress>,

    /// Carbon-copy recipients (`Cc:`).
    pub cc: Vec<EmailAddress>,

    /// Blind carbon-copy recipients (`Bcc:`), when the sender's copy keeps them.
    pub bcc: Vec<EmailAddress>,

    /// `Reply-To:` mailboxes.
    pub reply_to: Vec<EmailAddress>,

    /// Decoded subject line (RFC 2047 encoded-words resolved).
    pub subject: String,

    /// Parsed `Date:` header, if present and understood.
    pub date: Option<DateTime<Utc>>,

    /// The `Message-ID` header value.
    pub message_id: String,

    /// The `In-Reply-To` header value, if present.
    pub in_reply_to: Option<String>,

    /// Message-IDs from the `References` header.
    pub references: Vec<String>,

    /// Rich body: HTML markup if an HTML part was selected, else plaintext.
    pub body: String,

    /// `"text/html"` or `"text/plain"`, describing `body`.
    pub body_mime_type: String,

    /// Plaintext rendering of the same content. Never contains markup.
    pub plain_body: String,

    /// Attachments in document order.
    pub attachments: Vec<Attachment>,
}

impl ParsedMessage {
    /// Whether `body` holds HTML.
    pub fn is_html(&self) -> bool {
        self.body_mime_type == "text/html"
    }
}

//! Attachment descriptors.
//!
//! The payload is decoded once while the message is walked and then handed
//! out through a forward-only reader, so the MIME tree can be dropped while
//! callers are still streaming attachment content.

use std::io::{Cursor, Read};

/// How the sender asked the attachment to be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    /// Rendered in place, usually an image referenced from the HTML body.
    Inline,
    /// Offered as a separate file.
    Attachment,
}

impl Disposition {
    /// The header token for this disposition.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Attachment => "attachment",
        }
    }
}

/// One attachment found in a message.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Attachment {
    /// Decoded filename. Falls back to a generic name if none could be recovered.
    pub name: String,

    /// Declared MIME content type (e.g. `"image/png"`, `"application/pdf"`).
    pub mime_type: String,

    /// Inline or attachment.
    pub disposition: Disposition,

    /// Content-ID without angle brackets, for `cid:` references from HTML.
    pub content_id: Option<String>,

    /// Decoded size in bytes.
    pub size: usize,

    /// Transfer-decoded payload. Never charset-converted.
    #[serde(skip)]
    pub content: AttachmentContent,
}

impl Attachment {
    /// Build a descriptor around an already transfer-decoded payload.
    pub fn new(
        name: String,
        mime_type: String,
        disposition: Disposition,
        content_id: Option<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            name,
            mime_type,
            disposition,
            content_id,
            size: data.len(),
            content: AttachmentContent::new(data),
        }
    }
}

/// Forward-only reader over an attachment's decoded bytes.
///
/// Callers needing random access must drain it into their own buffer.
#[derive(Default)]
pub struct AttachmentContent {
    inner: Cursor<Vec<u8>>,
}

impl AttachmentContent {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self {
            inner: Cursor::new(data),
        }
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> usize {
        let total = self.inner.get_ref().len();
        let pos = usize::try_from(self.inner.position()).unwrap_or(total);
        total.saturating_sub(pos)
    }

    /// Read everything that is left.
    pub fn read_all(&mut self) -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.remaining());
        self.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl Read for AttachmentContent {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl std::fmt::Debug for AttachmentContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentContent")
            .field("remaining", &self.remaining())
            .finish()
    }
}

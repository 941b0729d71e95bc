//! Email parsing: header decoding, MIME walking, charset and transfer
//! decoding, and assembly into a [`ParsedMessage`].

pub mod assemble;
pub mod charset;
pub mod eml;
pub mod header;
pub mod html;
pub mod mime;
pub mod rfc2231;
pub mod transfer;

use tracing::debug;

use crate::config::ParserConfig;
use crate::error::Result;
use crate::model::message::ParsedMessage;

use self::assemble::PublicKey;

/// A message parser with a fixed decoding policy.
///
/// Parsing holds no state between calls, so one `Parser` can be shared
/// across threads.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    config: ParserConfig,
}

impl Parser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Parse one raw RFC 5322 message.
    pub fn parse(&self, raw: &[u8]) -> Result<ParsedMessage> {
        self.parse_with_key(raw, "", "")
    }

    /// Parse one raw message and append `public_key` as an attachment named
    /// after `key_name`. An empty key adds nothing.
    pub fn parse_with_key(
        &self,
        raw: &[u8],
        public_key: &str,
        key_name: &str,
    ) -> Result<ParsedMessage> {
        let message = skip_from_line(raw);
        debug!(size = message.len(), "Parsing message");
        assemble::assemble(
            message,
            PublicKey {
                armored: public_key,
                name: key_name,
            },
            &self.config,
        )
    }
}

/// Parse a message with the default policy.
pub fn parse_message(raw: &[u8], public_key: &str, key_name: &str) -> Result<ParsedMessage> {
    Parser::default().parse_with_key(raw, public_key, key_name)
}

/// Skip a UTF-8 BOM and the `From ` separator line of mbox-framed messages.
pub(crate) fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_from_line() {
        let data = b"From sender@pm.me Thu Jan  4 10:00:00 2024\nFrom: sender@pm.me\n\nbody";
        assert_eq!(skip_from_line(data), b"From: sender@pm.me\n\nbody");
    }

    #[test]
    fn test_skip_bom() {
        let data = b"\xEF\xBB\xBFFrom: sender@pm.me\n\nbody";
        assert_eq!(skip_from_line(data), b"From: sender@pm.me\n\nbody");
    }

    #[test]
    fn test_header_named_from_is_kept() {
        let data = b"From: sender@pm.me\n\nbody";
        assert_eq!(skip_from_line(data), data);
    }

    #[test]
    fn test_parse_mbox_framed_message() {
        let raw = b"From sender@pm.me Thu Jan  4 10:00:00 2024\nFrom: sender@pm.me\nContent-Type: text/plain\n\nbody";
        let msg = Parser::default().parse(raw).unwrap();
        assert_eq!(msg.sender.address, "sender@pm.me");
        assert_eq!(msg.body, "body");
    }
}

//! Structured mailbox addresses.
//!
//! The RFC 5322 grammar itself is handled by `mail-parser`; this module only
//! maps its output onto the flat record exposed by [`ParsedMessage`].
//!
//! [`ParsedMessage`]: crate::model::message::ParsedMessage

use std::fmt;

use mail_parser::{Addr, Address, MessageParser};

/// One mailbox: `"Ana Pérez" <ana@example.org>` becomes
/// `display_name = "Ana Pérez"`, `address = "ana@example.org"`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EmailAddress {
    /// Phrase before the angle address, empty when there is none.
    pub display_name: String,
    /// `local@domain`.
    pub address: String,
}

impl EmailAddress {
    /// Convert one `mail-parser` mailbox. Returns `None` when it carries no address.
    fn from_addr(addr: &Addr<'_>) -> Option<Self> {
        let address = addr.address()?.trim();
        if address.is_empty() {
            return None;
        }
        Some(Self {
            display_name: addr.name().map(|n| n.trim().to_string()).unwrap_or_default(),
            address: address.to_string(),
        })
    }

    /// Flatten an address header (lists and groups alike) in header order.
    fn list_from(value: Option<&Address<'_>>) -> Vec<Self> {
        value
            .map(|addrs| addrs.iter().filter_map(Self::from_addr).collect())
            .unwrap_or_default()
    }

    /// Parse a raw address-list header value, such as the body of a `To:` line.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let synthetic = format!("To: {}\r\n\r\n", raw.trim());
        MessageParser::default()
            .parse(synthetic.as_bytes())
            .map(|msg| Self::list_from(msg.to()))
            .unwrap_or_default()
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.display_name.as_str() {
            "" => f.write_str(&self.address),
            name => write!(f, "{name} <{}>", self.address),
        }
    }
}

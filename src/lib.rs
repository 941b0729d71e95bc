//! `mailsift`: turns raw RFC 5322 messages into a decoded body, a
//! plaintext body, and a list of attachments.
//!
//! Malformed input degrades instead of failing: unknown charsets fall back
//! to Latin-1, broken encodings decode best-effort, unusable filenames get a
//! generic name. Only a missing or unparsable sender (or a multipart body
//! with no parts at all) is an error.
//!
//! ```no_run
//! let raw = std::fs::read("message.eml")?;
//! let msg = mailsift::parser::Parser::default().parse(&raw)?;
//! println!("{}: {}", msg.sender, msg.plain_body);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod parser;

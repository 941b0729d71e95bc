//! Parser for individual `.eml` files (RFC 5322 messages without MBOX framing).

use std::path::Path;

use tracing::info;

use crate::error::{ParseError, Result};
use crate::model::message::ParsedMessage;
use crate::parser::Parser;

/// Read and parse a single `.eml` file.
pub fn parse_eml(path: impl AsRef<Path>, parser: &Parser) -> Result<ParsedMessage> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ParseError::FileNotFound(path.to_path_buf())
        } else {
            ParseError::io(path, e)
        }
    })?;

    info!(path = %path.display(), size = data.len(), "Parsing message file");
    parser.parse(&data)
}

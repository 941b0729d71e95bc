//! Output data model: the parsed message, its addresses, and its attachments.

pub mod address;
pub mod attachment;
pub mod message;

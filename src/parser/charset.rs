//! Charset resolution for text parts.
//!
//! Fallback order (each step is tried until one yields text):
//! 1. the declared charset, if recognized and the bytes are valid in it;
//! 2. ISO-8859-1, which maps every byte to a character and so always succeeds.
//!
//! Latin-2 (or any other 8-bit charset) mislabelled or unlabelled therefore
//! comes out as Latin-1 mojibake. That is accepted behavior: fixing it would
//! take content-based charset sniffing. Charset hints inside the body (an
//! HTML `<meta charset>`) are not consulted.

use std::collections::HashMap;
use std::sync::LazyLock;

use encoding_rs::Encoding;
use tracing::debug;

/// A charset this crate knows how to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// True ISO-8859-1: byte `n` is U+00nn. `encoding_rs` maps these labels to
    /// windows-1252, which differs in 0x80–0x9F.
    Latin1,
    Encoded(&'static Encoding),
}

/// Labels that must decode as true Latin-1 rather than windows-1252.
static LATIN1_LABELS: LazyLock<HashMap<&'static str, Charset>> = LazyLock::new(|| {
    [
        "iso-8859-1",
        "iso8859-1",
        "iso_8859-1",
        "iso_8859-1:1987",
        "latin1",
        "latin-1",
        "l1",
        "cp819",
        "ibm819",
        "csisolatin1",
        "iso-ir-100",
        "us-ascii",
        "ascii",
    ]
    .into_iter()
    .map(|label| (label, Charset::Latin1))
    .collect()
});

impl Charset {
    /// Look up a charset label (case-insensitive, quotes and blanks ignored).
    pub fn for_label(label: &str) -> Option<Self> {
        let label = label.trim().trim_matches('"').trim().to_ascii_lowercase();
        if label.is_empty() {
            return None;
        }
        if let Some(charset) = LATIN1_LABELS.get(label.as_str()) {
            return Some(*charset);
        }
        Encoding::for_label(label.as_bytes()).map(Charset::Encoded)
    }

    /// Decode without replacement characters; `None` on any invalid sequence.
    pub fn decode_strict(self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::Latin1 => Some(decode_latin1(bytes)),
            Self::Encoded(encoding) => encoding
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|text| text.into_owned()),
        }
    }
}

/// One step of the fallback chain.
type Strategy = fn(Option<&str>, &[u8]) -> Option<String>;

/// The documented fallback order. The last entry is total.
const FALLBACK_ORDER: [(&str, Strategy); 2] =
    [("declared", decode_declared), ("latin-1", decode_as_latin1)];

/// Turn a text part's bytes into a string, given its declared charset.
pub fn resolve(declared: Option<&str>, bytes: &[u8]) -> String {
    for (step, strategy) in FALLBACK_ORDER {
        if let Some(text) = strategy(declared, bytes) {
            return text;
        }
        debug!(step, charset = declared.unwrap_or(""), "Charset step failed, falling back");
    }
    decode_latin1(bytes)
}

fn decode_declared(declared: Option<&str>, bytes: &[u8]) -> Option<String> {
    let label = declared?;
    let Some(charset) = Charset::for_label(label) else {
        debug!(charset = label, "Unrecognized charset");
        return None;
    };
    charset.decode_strict(bytes)
}

fn decode_as_latin1(_declared: Option<&str>, bytes: &[u8]) -> Option<String> {
    Some(decode_latin1(bytes))
}

/// ISO-8859-1: every byte maps to the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_order_is_declared_then_latin1() {
        let names: Vec<&str> = FALLBACK_ORDER.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["declared", "latin-1"]);
    }

    #[test]
    fn test_recognized_charset() {
        assert_eq!(resolve(Some("utf-8"), "řšřš".as_bytes()), "řšřš");
        assert_eq!(resolve(Some("UTF8"), b"body"), "body");

        let (latin2, _, _) = encoding_rs::ISO_8859_2.encode("řšřšřš");
        assert_eq!(resolve(Some("ISO-8859-2"), &latin2), "řšřšřš");
    }

    #[test]
    fn test_latin1_is_not_windows_1252() {
        // 0x80 is U+0080 in Latin-1 but U+20AC (euro) in windows-1252
        assert_eq!(resolve(Some("iso-8859-1"), &[0x80]), "\u{80}");
        assert_eq!(resolve(Some("windows-1252"), &[0x80]), "€");
    }

    #[test]
    fn test_unknown_charset_is_latin1() {
        let bytes = [0xE9; 7];
        assert_eq!(resolve(Some("x-made-up"), &bytes), "ééééééé");
    }

    #[test]
    fn test_missing_charset_is_latin1() {
        let (latin2, _, _) = encoding_rs::ISO_8859_2.encode("řšřšřš");
        let decoded = resolve(None, &latin2);
        assert_eq!(decoded, "ø¹ø¹ø¹");
        assert_ne!(decoded, "řšřšřš");
    }

    #[test]
    fn test_invalid_utf8_falls_back_to_latin1() {
        assert_eq!(resolve(Some("utf-8"), &[b'a', 0xE9, b'b']), "aéb");
    }

    #[test]
    fn test_ascii_label_with_high_bytes() {
        assert_eq!(resolve(Some("us-ascii"), &[0xE9]), "é");
    }

    #[test]
    fn test_for_label_normalizes() {
        assert_eq!(Charset::for_label(" \"LATIN1\" "), Some(Charset::Latin1));
        assert_eq!(
            Charset::for_label("Shift_JIS"),
            Some(Charset::Encoded(encoding_rs::SHIFT_JIS))
        );
        assert_eq!(Charset::for_label(""), None);
        assert_eq!(Charset::for_label("klingon"), None);
    }
}

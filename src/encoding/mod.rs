//! Encoding detection and transcoding.
//!
//! Byte input is decoded to UTF-8 before parsing:
//!
//! 1. A Byte Order Mark (UTF-8, UTF-16LE, UTF-16BE) decides the encoding
//!    and is skipped.
//! 2. Without a BOM, an `encoding="..."` label in a leading XML declaration
//!    is honored.
//! 3. Otherwise the input must be UTF-8.
//!
//! Transcoding goes through `encoding_rs`.

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use thiserror::Error;

/// How far into the input the XML declaration is looked for.
const DECLARATION_SCAN_LIMIT: usize = 256;

/// An error that occurs during encoding detection or transcoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// The label does not name an encoding `encoding_rs` knows.
    #[error("unsupported encoding `{0}`")]
    Unsupported(String),

    /// The bytes are not valid in the detected encoding.
    #[error("malformed byte sequence for encoding {0}")]
    Malformed(&'static str),
}

/// Detects a Byte Order Mark, returning the encoding it announces and its
/// length in bytes.
///
/// # Examples
///
/// ```
/// use fluentxml::encoding::detect_bom;
///
/// let (encoding, skip) = detect_bom(b"\xEF\xBB\xBF<root/>").unwrap();
/// assert_eq!(encoding.name(), "UTF-8");
/// assert_eq!(skip, 3);
/// assert!(detect_bom(b"<root/>").is_none());
/// ```
#[must_use]
pub fn detect_bom(bytes: &[u8]) -> Option<(&'static Encoding, usize)> {
    match bytes {
        [0xEF, 0xBB, 0xBF, ..] => Some((UTF_8, 3)),
        [0xFE, 0xFF, ..] => Some((UTF_16BE, 2)),
        [0xFF, 0xFE, ..] => Some((UTF_16LE, 2)),
        _ => None,
    }
}

/// Transcodes bytes from the encoding named by `label` into UTF-8.
///
/// # Errors
///
/// Returns [`EncodingError::Unsupported`] for an unknown label and
/// [`EncodingError::Malformed`] for invalid input.
pub fn transcode(bytes: &[u8], label: &str) -> Result<String, EncodingError> {
    let encoding = Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| EncodingError::Unsupported(label.to_string()))?;
    decode_with(encoding, bytes)
}

fn decode_with(encoding: &'static Encoding, bytes: &[u8]) -> Result<String, EncodingError> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(std::borrow::Cow::into_owned)
        .ok_or(EncodingError::Malformed(encoding.name()))
}

/// Extracts the `encoding` label of a leading XML declaration, reading the
/// bytes as ASCII.
#[must_use]
pub fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let scan = &bytes[..bytes.len().min(DECLARATION_SCAN_LIMIT)];
    if !scan.starts_with(b"<?xml") {
        return None;
    }
    let end = scan.windows(2).position(|w| w == b"?>")?;
    let decl = &scan[..end];
    let needle = b"encoding";
    let at = decl.windows(needle.len()).position(|w| w == needle)?;
    let rest = skip_whitespace(&decl[at + needle.len()..]);
    let (&equals, rest) = rest.split_first()?;
    if equals != b'=' {
        return None;
    }
    let (&quote, value) = skip_whitespace(rest).split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let close = value.iter().position(|&b| b == quote)?;
    String::from_utf8(value[..close].to_vec()).ok()
}

fn skip_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

/// Decodes raw markup bytes into a UTF-8 string, detecting the encoding.
///
/// # Errors
///
/// Returns [`EncodingError`] if the declared encoding is unknown or the
/// bytes are malformed for the detected encoding.
///
/// # Examples
///
/// ```
/// use fluentxml::encoding::decode_to_utf8;
///
/// let latin1 = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><r>caf\xE9</r>";
/// let text = decode_to_utf8(latin1).unwrap();
/// assert!(text.ends_with("<r>caf\u{e9}</r>"));
/// ```
pub fn decode_to_utf8(bytes: &[u8]) -> Result<String, EncodingError> {
    if let Some((encoding, skip)) = detect_bom(bytes) {
        return decode_with(encoding, &bytes[skip..]);
    }
    match declared_encoding(bytes) {
        Some(label) => {
            let encoding = Encoding::for_label(label.trim().as_bytes())
                .ok_or_else(|| EncodingError::Unsupported(label.clone()))?;
            // A UTF-16 label without a BOM cannot be right for ASCII-readable
            // bytes; read them as UTF-8 instead.
            let encoding = if encoding == UTF_16LE || encoding == UTF_16BE {
                UTF_8
            } else {
                encoding
            };
            decode_with(encoding, bytes)
        }
        None => decode_with(UTF_8, bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_utf8() {
        assert_eq!(decode_to_utf8(b"<r>x</r>").unwrap(), "<r>x</r>");
    }

    #[test]
    fn test_utf8_bom_is_skipped() {
        assert_eq!(decode_to_utf8(b"\xEF\xBB\xBF<r/>").unwrap(), "<r/>");
    }

    #[test]
    fn test_utf16le_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "<r>\u{e9}</r>".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_to_utf8(&bytes).unwrap(), "<r>\u{e9}</r>");
    }

    #[test]
    fn test_declared_encoding() {
        assert_eq!(
            declared_encoding(b"<?xml version='1.0' encoding = 'windows-1252'?><r/>"),
            Some("windows-1252".to_string())
        );
        assert_eq!(declared_encoding(b"<?xml version='1.0'?><r/>"), None);
        assert_eq!(declared_encoding(b"<r/>"), None);
    }

    #[test]
    fn test_unknown_declared_encoding() {
        let err = decode_to_utf8(b"<?xml version=\"1.0\" encoding=\"klingon\"?><r/>").unwrap_err();
        assert_eq!(err, EncodingError::Unsupported("klingon".to_string()));
    }

    #[test]
    fn test_malformed_utf8() {
        let err = decode_to_utf8(b"<r>\xFF\xFD</r>").unwrap_err();
        assert_eq!(err, EncodingError::Malformed("UTF-8"));
    }

    #[test]
    fn test_transcode_label() {
        assert_eq!(transcode(b"caf\xE9", "latin1").unwrap(), "caf\u{e9}");
        assert!(matches!(
            transcode(b"x", "nope"),
            Err(EncodingError::Unsupported(_))
        ));
    }
}

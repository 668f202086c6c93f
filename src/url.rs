//! Escaping of string property values.
//!
//! Some brokers reject property strings containing characters that are
//! forbidden in NGSI-LD (`<`, `>`, `"`, `'`, `=`, `;`, `(`, `)`). Values
//! built with `escape` set are percent-encoded so they survive the trip.

use std::borrow::Cow;

/// Percent-encode a value.
pub fn escape(value: &str) -> Cow<'_, str> {
    urlencoding::encode(value)
}

/// Reverse [`escape`]. Invalid UTF-8 sequences are replaced lossily.
pub fn unescape(value: &str) -> Cow<'_, str> {
    match urlencoding::decode(value) {
        Ok(decoded) => decoded,
        Err(_) => {
            let bytes = urlencoding::decode_binary(value.as_bytes());
            Cow::Owned(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}

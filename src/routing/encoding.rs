//! URL-safe base64 path encoding.
//!
//! Targets embedded in a path are the UTF-8 bytes of the absolute URL,
//! base64-encoded with `+` → `-`, `/` → `_` and the trailing `=` dropped.
//! Decoding reverses the substitution, tolerates missing or present padding
//! and also accepts the standard alphabet.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE_NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;

const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Reasons an encoded segment could not be turned back into a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    Base64(base64::DecodeError),
    Utf8,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Base64(e) => write!(f, "malformed base64: {}", e),
            DecodeError::Utf8 => write!(f, "decoded bytes are not UTF-8"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// An encoded target, safe to embed as a single path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedPath(String);

impl EncodedPath {
    /// Encode an absolute URL string.
    pub fn encode(url: &str) -> Self {
        Self(URL_SAFE_NO_PAD.encode(url.as_bytes()))
    }

    /// Wrap an already-encoded segment taken from a request path.
    pub fn from_segment(segment: impl Into<String>) -> Self {
        Self(segment.into())
    }

    /// Decode back into the original URL string.
    pub fn decode(&self) -> Result<String, DecodeError> {
        let standard: String = self
            .0
            .chars()
            .map(|c| match c {
                '-' => '+',
                '_' => '/',
                other => other,
            })
            .collect();

        let bytes = LENIENT_STANDARD
            .decode(standard.as_bytes())
            .map_err(DecodeError::Base64)?;
        String::from_utf8(bytes).map_err(|_| DecodeError::Utf8)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EncodedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build the re-proxyable path `<prefix>/<encoded>` for an absolute URL.
pub fn proxied_path(prefix: &str, url: &str) -> String {
    format!("{}/{}", prefix, EncodedPath::encode(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let urls = [
            "https://example.com/",
            "https://example.com/a?x=1&y=%20z#frag",
            "http://user:pw@127.0.0.1:8080/path/with/many/segments",
            "wss://stream.example.org/socket?token=abc",
            "https://例え.jp/パス?q=ü",
        ];
        for url in urls {
            let encoded = EncodedPath::encode(url);
            assert_eq!(encoded.decode().unwrap(), url);
        }
    }

    #[test]
    fn test_encoding_is_path_safe() {
        // Bytes chosen so the standard alphabet would emit '+', '/' and padding.
        let encoded = EncodedPath::encode("https://example.com/?>>>??");
        let s = encoded.as_str();
        assert!(!s.contains('+'));
        assert!(!s.contains('/'));
        assert!(!s.contains('='));
    }

    #[test]
    fn test_known_value() {
        assert_eq!(
            EncodedPath::encode("https://example.com/b").as_str(),
            "aHR0cHM6Ly9leGFtcGxlLmNvbS9i"
        );
    }

    #[test]
    fn test_accepts_padding_and_standard_alphabet() {
        // "a>" encodes to "YT4=" in the standard alphabet.
        assert_eq!(EncodedPath::from_segment("YT4=").decode().unwrap(), "a>");
        assert_eq!(EncodedPath::from_segment("YT4").decode().unwrap(), "a>");
        // "??>" is "Pz8+" standard, "Pz8-" url-safe.
        assert_eq!(EncodedPath::from_segment("Pz8+").decode().unwrap(), "??>");
        assert_eq!(EncodedPath::from_segment("Pz8-").decode().unwrap(), "??>");
    }

    #[test]
    fn test_rejects_malformed_base64() {
        let err = EncodedPath::from_segment("not*base64").decode().unwrap_err();
        assert!(matches!(err, DecodeError::Base64(_)));
    }

    #[test]
    fn test_rejects_invalid_utf8() {
        // 0xff 0xfe is not UTF-8.
        let err = EncodedPath::from_segment("__4").decode().unwrap_err();
        assert_eq!(err, DecodeError::Utf8);
    }

    #[test]
    fn test_proxied_path() {
        assert_eq!(
            proxied_path("/proxy", "https://example.com/b"),
            "/proxy/aHR0cHM6Ly9leGFtcGxlLmNvbS9i"
        );
    }
}

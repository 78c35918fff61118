use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataUrlError {
    #[error("invalid data URL")]
    Malformed,
    #[error("invalid base64 payload: {0}")]
    Payload(String),
}

/// Self-describing inline payload: optional media type, transfer encoding,
/// and the data itself. Some engine integrations hand back rasterized
/// images in this shape instead of raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub media_type: Option<String>,
    pub base64: bool,
    pub data: String,
}

impl DataUrl {
    pub fn parse(raw: &str) -> Result<Self, DataUrlError> {
        let rest = raw.strip_prefix("data:").ok_or(DataUrlError::Malformed)?;
        let (meta, data) = rest.split_once(',').ok_or(DataUrlError::Malformed)?;
        let (media_type, base64) = match meta.strip_suffix(";base64") {
            Some(media_type) => (media_type, true),
            None => (meta, false),
        };
        Ok(Self {
            media_type: (!media_type.is_empty()).then(|| media_type.to_string()),
            base64,
            data: data.to_string(),
        })
    }

    /// Raw payload bytes, undoing the base64 wrapper when present.
    pub fn decode(&self) -> Result<Vec<u8>, DataUrlError> {
        if self.base64 {
            STANDARD
                .decode(self.data.as_bytes())
                .map_err(|err| DataUrlError::Payload(err.to_string()))
        } else {
            Ok(self.data.clone().into_bytes())
        }
    }
}

impl fmt::Display for DataUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{}", self.media_type.as_deref().unwrap_or(""))?;
        if self.base64 {
            f.write_str(";base64")?;
        }
        write!(f, ",{}", self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_payload_has_no_media_type() {
        let url = DataUrl::parse("data:,hello+world").expect("valid data URL");
        assert_eq!(url.media_type, None);
        assert!(!url.base64);
        assert_eq!(url.data, "hello+world");
    }

    #[test]
    fn media_type_and_encoding_are_extracted() {
        let url = DataUrl::parse("data:application/json;base64,eyJoZWxsbyI6ICJ3b3JsZCJ9Cg==")
            .expect("valid data URL");
        assert_eq!(url.media_type.as_deref(), Some("application/json"));
        assert!(url.base64);
        assert_eq!(url.decode().expect("decodable"), b"{\"hello\": \"world\"}\n");
    }

    #[test]
    fn base64_without_media_type_still_decodes() {
        let url = DataUrl::parse("data:;base64,aGVsbG8gd29ybGQK").expect("valid data URL");
        assert_eq!(url.media_type, None);
        assert!(url.base64);
        assert_eq!(url.decode().expect("decodable"), b"hello world\n");
    }

    #[test]
    fn missing_prefix_or_comma_is_malformed() {
        for raw in ["abc", "data:hello", ","] {
            assert_eq!(DataUrl::parse(raw), Err(DataUrlError::Malformed));
        }
    }

    #[test]
    fn display_round_trips() {
        for raw in [
            "data:,hello+world",
            "data:text/html,<b>hello</b>",
            "data:application/json;base64,eyJoZWxsbyI6ICJ3b3JsZCJ9Cg==",
            "data:;base64,aGVsbG8gd29ybGQK",
        ] {
            let url = DataUrl::parse(raw).expect("valid data URL");
            assert_eq!(url.to_string(), raw);
            assert_eq!(DataUrl::parse(&url.to_string()), Ok(url));
        }
    }
}

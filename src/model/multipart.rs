//! `multipart/related` bodies carrying a media link entry and its media.

use base64::Engine;

use super::codec::{media_type_essence, media_type_param};
use crate::error::{ProviderError, ProviderResult};

pub const MULTIPART_RELATED: &str = "multipart/related";

/// One body part: lower-cased header names and the decoded content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Part {
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Part {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type").filter(|v| !v.trim().is_empty())
    }
}

/// A media link entry followed by the media resource it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartRelated {
    /// Value of the `type` parameter, the media type of the root part
    pub root_type: String,
    pub entry: Part,
    pub media: Part,
}

#[must_use]
pub fn is_multipart_related(content_type: &str) -> bool {
    media_type_essence(content_type) == MULTIPART_RELATED
}

impl MultipartRelated {
    /// Split `body` on the boundary named in `content_type`.
    ///
    /// The first part is the entry and must declare a content type; the
    /// second is the media. Parts sent with `Content-Transfer-Encoding: base64`
    /// are decoded. Anything after the second part is ignored.
    pub fn parse(content_type: &str, body: &[u8]) -> ProviderResult<Self> {
        if !is_multipart_related(content_type) {
            return Err(ProviderError::UnsupportedMediaType(content_type.to_string()));
        }
        let boundary = media_type_param(content_type, "boundary")
            .filter(|b| !b.is_empty())
            .ok_or_else(|| ProviderError::BadRequest("multipart/related without boundary parameter".into()))?;
        let root_type = media_type_param(content_type, "type")
            .ok_or_else(|| ProviderError::BadRequest("multipart/related without type parameter".into()))?
            .to_string();

        let mut parts = split_parts(body, boundary)?.into_iter();
        let (entry, media) = match (parts.next(), parts.next()) {
            (Some(entry), Some(media)) => (entry, media),
            _ => {
                return Err(ProviderError::BadRequest(
                    "multipart/related needs an entry part and a media part".into(),
                ))
            }
        };
        if entry.content_type().is_none() {
            return Err(ProviderError::BadRequest("media link entry part has no content type".into()));
        }
        if media.content_type().is_none() {
            return Err(ProviderError::BadRequest("media part has no content type".into()));
        }
        Ok(Self { root_type, entry, media })
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

fn split_parts(body: &[u8], boundary: &str) -> ProviderResult<Vec<Part>> {
    let delimiter = format!("--{boundary}").into_bytes();
    let separator = format!("\r\n--{boundary}").into_bytes();
    let malformed = || ProviderError::BadRequest("malformed multipart/related body".into());

    // the first delimiter may open the body or follow a preamble
    let mut pos = if body.starts_with(&delimiter) {
        delimiter.len()
    } else {
        find(body, &separator, 0).ok_or_else(malformed)? + separator.len()
    };

    let mut parts = Vec::new();
    loop {
        if body[pos..].starts_with(b"--") {
            return Ok(parts);
        }
        // transport padding up to the line break
        let line_end = find(body, b"\r\n", pos).ok_or_else(malformed)?;
        let start = line_end + 2;
        let end = find(body, &separator, start).ok_or_else(malformed)?;
        parts.push(parse_part(&body[start..end])?);
        pos = end + separator.len();
    }
}

fn parse_part(raw: &[u8]) -> ProviderResult<Part> {
    let (head, content) = if raw.starts_with(b"\r\n") {
        (&raw[..0], &raw[2..])
    } else {
        let split = find(raw, b"\r\n\r\n", 0)
            .ok_or_else(|| ProviderError::BadRequest("multipart part without header terminator".into()))?;
        (&raw[..split], &raw[split + 4..])
    };

    let head = String::from_utf8_lossy(head);
    let headers: Vec<(String, String)> = head
        .split("\r\n")
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            Some((name.trim().to_ascii_lowercase(), value.trim().to_string()))
        })
        .collect();

    let mut part = Part { headers, body: content.to_vec() };
    let base64 = part
        .header("content-transfer-encoding")
        .is_some_and(|e| e.eq_ignore_ascii_case("base64"));
    if base64 {
        let compact: Vec<u8> = content.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect();
        part.body = base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(|e| ProviderError::BadRequest(format!("invalid base64 media part: {e}")))?;
    }
    Ok(part)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CT: &str = r#"multipart/related; boundary="XYZ"; type="application/json""#;

    fn body(media_headers: &str, media: &str) -> Vec<u8> {
        format!(
            "preamble\r\n--XYZ\r\nContent-Type: application/json\r\n\r\n{{\"title\":\"Cat\"}}\r\n--XYZ\r\n{media_headers}\r\n\r\n{media}\r\n--XYZ--\r\n"
        )
        .into_bytes()
    }

    #[test]
    fn test_parse_entry_and_media() {
        let related = MultipartRelated::parse(CT, &body("Content-Type: image/png", "PNGDATA")).unwrap();
        assert_eq!(related.root_type, "application/json");
        assert_eq!(related.entry.content_type(), Some("application/json"));
        assert_eq!(related.entry.body, br#"{"title":"Cat"}"#.to_vec());
        assert_eq!(related.media.content_type(), Some("image/png"));
        assert_eq!(related.media.body, b"PNGDATA".to_vec());
    }

    #[test]
    fn test_base64_media_is_decoded() {
        let related = MultipartRelated::parse(
            CT,
            &body("Content-Type: image/png\r\nContent-Transfer-Encoding: base64", "AQID\r\nBA=="),
        )
        .unwrap();
        assert_eq!(related.media.body, vec![1u8, 2, 3, 4]);
    }

    #[test]
    fn test_binary_media_keeps_crlf_inside() {
        let related = MultipartRelated::parse(CT, &body("Content-Type: text/plain", "a\r\nb")).unwrap();
        assert_eq!(related.media.body, b"a\r\nb".to_vec());
    }

    #[test]
    fn test_malformed_bodies_are_bad_requests() {
        let cases: [(&str, Vec<u8>); 5] = [
            ("multipart/related; type=\"application/json\"", body("Content-Type: image/png", "x")),
            ("multipart/related; boundary=XYZ", body("Content-Type: image/png", "x")),
            (CT, body("X-Other: 1", "x")),
            (CT, b"--XYZ\r\nContent-Type: application/json\r\n\r\n{}\r\n--XYZ--".to_vec()),
            (CT, b"no boundary here".to_vec()),
        ];
        for (content_type, body) in cases {
            let err = MultipartRelated::parse(content_type, &body).unwrap_err();
            assert_eq!(err.status(), 400, "{content_type}: {err}");
        }
    }

    #[test]
    fn test_other_media_types_are_rejected() {
        assert!(is_multipart_related("Multipart/Related; boundary=a"));
        let err = MultipartRelated::parse("multipart/mixed; boundary=XYZ", b"").unwrap_err();
        assert_eq!(err.status(), 415);
    }
}

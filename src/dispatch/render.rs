//! Turn a raw target API response into a chat reply by content type.

use serde_json::Value;
use thiserror::Error;

use crate::handlers::ApiResponse;

/// Outbound chat reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// HTML text, sent as is.
    Text(String),
    /// Preformatted text; escaped and wrapped in `<pre>` on send.
    Code(String),
    Photo { bytes: Vec<u8>, file_name: String },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unsupported content type: {0}")]
    Unsupported(String),
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentKind {
    Json,
    Image,
    Other,
}

/// Media type without parameters, lowercased.
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn classify(content_type: &str) -> ContentKind {
    let essence = essence(content_type);
    if essence == "application/json" || essence.ends_with("+json") {
        ContentKind::Json
    } else if essence.starts_with("image/") {
        ContentKind::Image
    } else {
        ContentKind::Other
    }
}

/// File name for a photo upload, e.g. `image.png` for `image/png`.
fn image_file_name(content_type: &str) -> String {
    let essence = essence(content_type);
    let subtype = essence
        .strip_prefix("image/")
        .map(|s| s.split('+').next().unwrap_or(s))
        .filter(|s| !s.is_empty())
        .unwrap_or("png");
    format!("image.{subtype}")
}

pub fn render(response: ApiResponse) -> Result<Reply, RenderError> {
    let content_type = response.content_type.unwrap_or_default();
    match classify(&content_type) {
        ContentKind::Json => {
            let value: Value = serde_json::from_slice(&response.body)?;
            Ok(Reply::Code(serde_json::to_string_pretty(&value)?))
        }
        ContentKind::Image => Ok(Reply::Photo {
            file_name: image_file_name(&content_type),
            bytes: response.body,
        }),
        ContentKind::Other => Err(RenderError::Unsupported(content_type)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn response(content_type: Option<&str>, body: &[u8]) -> ApiResponse {
        ApiResponse {
            status: StatusCode::OK,
            content_type: content_type.map(str::to_string),
            body: body.to_vec(),
        }
    }

    #[test]
    fn json_is_pretty_printed() {
        let reply = render(response(Some("application/json"), br#"{"rows":[1,2],"total":1234.5}"#)).unwrap();
        assert_eq!(
            reply,
            Reply::Code("{\n  \"rows\": [\n    1,\n    2\n  ],\n  \"total\": 1234.5\n}".into())
        );
    }

    #[test]
    fn json_rendering_is_deterministic() {
        let body = br#"{"b":1,"a":{"y":2,"x":3}}"#;
        let first = render(response(Some("application/json"), body)).unwrap();
        let second = render(response(Some("application/json"), body)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn json_variants_are_recognised() {
        for ct in ["application/json; charset=utf-8", "application/problem+json", "Application/JSON"] {
            assert!(matches!(render(response(Some(ct), b"{}")), Ok(Reply::Code(_))), "{ct}");
        }
    }

    #[test]
    fn image_bytes_pass_through() {
        let png = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 1, 2];
        let reply = render(response(Some("image/png"), &png)).unwrap();
        assert_eq!(reply, Reply::Photo { bytes: png.to_vec(), file_name: "image.png".into() });
    }

    #[test]
    fn image_file_name_follows_subtype() {
        assert_eq!(image_file_name("image/jpeg"), "image.jpeg");
        assert_eq!(image_file_name("image/svg+xml"), "image.svg");
        assert_eq!(image_file_name("image/"), "image.png");
    }

    #[test]
    fn other_types_are_unsupported() {
        assert!(matches!(
            render(response(Some("text/html"), b"<html>")),
            Err(RenderError::Unsupported(ct)) if ct == "text/html"
        ));
        assert!(matches!(render(response(None, b"x")), Err(RenderError::Unsupported(_))));
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(matches!(
            render(response(Some("application/json"), b"{oops")),
            Err(RenderError::InvalidJson(_))
        ));
    }
}

//! Request encoding: image bytes → base64 → Gemini `generateContent` body.
//!
//! The body is one user turn with two parts, the extraction prompt followed
//! by the inline image:
//!
//! ```json
//! {"contents":[{"parts":[{"text":"…"},{"inlineData":{"mimeType":"image/png","data":"…"}}]}]}
//! ```

use crate::pipeline::intake::ImageUpload;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use tracing::debug;

/// A validated image ready to embed in a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: &'static str,
    /// Standard base64 (with padding) of the raw file bytes.
    pub data: String,
}

/// Base64-encode an accepted upload.
pub fn encode_image(upload: &ImageUpload<'_>) -> EncodedImage {
    let data = STANDARD.encode(upload.bytes);
    debug!(
        "Encoded '{}' → {} bytes base64",
        upload.filename,
        data.len()
    );
    EncodedImage {
        mime_type: upload.mime_type(),
        data,
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateContentRequest<'a> {
    pub contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
pub struct Content<'a> {
    pub parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Part<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData<'a> {
    pub mime_type: &'a str,
    pub data: &'a str,
}

/// Build the request body for one image.
pub fn build_request<'a>(prompt: &'a str, image: &'a EncodedImage) -> GenerateContentRequest<'a> {
    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![
                Part::Text { text: prompt },
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: image.mime_type,
                        data: &image.data,
                    },
                },
            ],
        }],
    }
}

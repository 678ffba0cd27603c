//! `data:` URL encoding and decoding for rendered images

use crate::error::{BgComposeError, Result};
use base64::Engine;

/// Decoded contents of a `data:` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    /// Media type from the header, if present
    pub mime_type: Option<String>,
    /// Decoded payload
    pub bytes: Vec<u8>,
}

/// Whether the reference uses the `data:` scheme
#[must_use]
pub fn is_data_url(reference: &str) -> bool {
    reference
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

/// Encode bytes as `data:<mime>;base64,<payload>`
#[must_use]
pub fn encode(bytes: &[u8], mime_type: &str) -> String {
    format!(
        "data:{};base64,{}",
        mime_type,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Decode a base64 or percent-encoded `data:` URL
///
/// # Errors
/// - Reference is not a `data:` URL
/// - Missing `,` separator
/// - Invalid base64 or percent-encoding in the payload
pub fn decode(data_url: &str) -> Result<DataUrl> {
    if !is_data_url(data_url) {
        return Err(BgComposeError::image_load("Not a data: URL"));
    }

    let (header, payload) = data_url
        .get(5..)
        .and_then(|rest| rest.split_once(','))
        .ok_or_else(|| BgComposeError::image_load("Malformed data URL: missing payload"))?;

    let mut is_base64 = false;
    let mut mime_type = None;
    for (idx, segment) in header.split(';').enumerate() {
        let seg = segment.trim();
        if seg.eq_ignore_ascii_case("base64") {
            is_base64 = true;
        } else if idx == 0 && seg.contains('/') {
            mime_type = Some(seg.to_ascii_lowercase());
        }
    }

    let bytes = if is_base64 {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| BgComposeError::image_load(format!("Invalid base64 data URL: {}", e)))?
    } else {
        percent_decode(payload)?
    };

    Ok(DataUrl { mime_type, bytes })
}

fn percent_decode(input: &str) -> Result<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while let Some(&b) = bytes.get(i) {
        if b == b'%' {
            let hex = input
                .get(i + 1..i + 3)
                .ok_or_else(|| BgComposeError::image_load("Truncated percent-escape in data URL"))?;
            let value = u8::from_str_radix(hex, 16).map_err(|_| {
                BgComposeError::image_load(format!("Invalid percent-escape '%{}' in data URL", hex))
            })?;
            out.push(value);
            i += 3;
        } else {
            out.push(b);
            i += 1;
        }
    }
    Ok(out)
}

//! Selectable overlay identities and target image loading.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::compositor::CompositorError;

/// One selectable overlay identity from the preset catalog.
///
/// `image_url` points at the full-resolution overlay bitmap and
/// `thumbnail_url` at the selector thumbnail; both are `data:` URIs for
/// built-in presets but may equally be file paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFace {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub thumbnail_url: String,
}

/// Resolve a target image source to raw encoded bytes.
///
/// Supported sources: `data:` URIs with a base64 payload, `file://`
/// URLs and bare filesystem paths. Remote HTTP sources are not fetched
/// by the engine.
pub(crate) async fn fetch_image_bytes(url: &str) -> Result<Vec<u8>, CompositorError> {
    if let Some(rest) = url.strip_prefix("data:") {
        let (_, payload) = rest
            .split_once(";base64,")
            .ok_or(CompositorError::MalformedDataUri)?;
        return Ok(BASE64.decode(payload)?);
    }

    let path = url.strip_prefix("file://").unwrap_or(url);
    if path.contains("://") {
        return Err(CompositorError::UnsupportedSource(url.to_string()));
    }

    tokio::fs::read(path)
        .await
        .map_err(|source| CompositorError::Io {
            path: path.to_string(),
            source,
        })
}

/// Decode encoded image bytes into RGBA off the render thread.
pub(crate) async fn decode_image(bytes: Vec<u8>) -> Result<image::RgbaImage, CompositorError> {
    tokio::task::spawn_blocking(move || {
        image::load_from_memory(&bytes).map(|img| img.to_rgba8())
    })
    .await
    .map_err(|_| CompositorError::DecodeTask)?
    .map_err(CompositorError::from)
}

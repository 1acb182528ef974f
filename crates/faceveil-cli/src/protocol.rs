//! Detection backend wire types.
//!
//! The engine itself emits no network traffic; these are the message
//! shapes the hosting application exchanges with the remote detection
//! service, defined here so the demo renderer can produce byte-exact
//! payloads in dry-run mode. The WebSocket path carries tagged JSON
//! messages on a per-session endpoint; the REST path is a multipart
//! upload whose response shape differs slightly.

use anyhow::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use faceveil_core::Surface;

/// JPEG quality for streamed frames.
const FRAME_JPEG_QUALITY: u8 = 80;

/// Messages sent to the backend over the WebSocket session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// One JPEG-encoded frame, base64 payload, client timestamp in
    /// milliseconds since the Unix epoch.
    Frame { data: String, timestamp: i64 },
}

/// Messages received from the backend over the WebSocket session.
/// The dry-run renderer only emits; inbound shapes are kept for the
/// live client.
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    DetectionResult {
        is_fake: bool,
        confidence: f32,
        processing_time_ms: f64,
        model: String,
    },
}

/// REST fallback response for a multipart frame upload.
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub result: DetectionVerdict,
    pub processing_time_ms: f64,
}

#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionVerdict {
    pub is_fake: bool,
    pub confidence: f32,
    pub model_used: String,
}

/// One streaming session toward the backend.
pub struct StreamSession {
    id: Uuid,
}

impl StreamSession {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Per-session WebSocket endpoint under the given base URL.
    #[allow(dead_code)]
    pub fn endpoint(&self, base: &str) -> String {
        format!("{}/ws/{}", base.trim_end_matches('/'), self.id)
    }
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a composited frame as the WebSocket frame message: JPEG at
/// fixed quality, base64 payload, current wall-clock timestamp.
pub fn frame_message(frame: &Surface) -> Result<ClientMessage> {
    let rgb = image::DynamicImage::ImageRgba8(frame.to_rgba_image()).to_rgb8();
    let mut buf = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buf);
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, FRAME_JPEG_QUALITY);
    image::DynamicImage::ImageRgb8(rgb).write_with_encoder(encoder)?;

    Ok(ClientMessage::Frame {
        data: BASE64.encode(buf),
        timestamp: chrono::Utc::now().timestamp_millis(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_message_wire_shape() {
        let msg = ClientMessage::Frame {
            data: "abcd".to_string(),
            timestamp: 1700000000000,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "frame");
        assert_eq!(json["data"], "abcd");
        assert_eq!(json["timestamp"], 1700000000000i64);
    }

    #[test]
    fn test_detection_result_parses() {
        let raw = r#"{"type":"detection_result","is_fake":true,"confidence":0.87,"processing_time_ms":42.5,"model":"efficientnet-b4"}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let ServerMessage::DetectionResult {
            is_fake,
            confidence,
            model,
            ..
        } = msg;
        assert!(is_fake);
        assert!((confidence - 0.87).abs() < 1e-6);
        assert_eq!(model, "efficientnet-b4");
    }

    #[test]
    fn test_rest_response_parses() {
        let raw = r#"{"result":{"is_fake":false,"confidence":0.12,"model_used":"xception"},"processing_time_ms":97.0}"#;
        let resp: DetectionResponse = serde_json::from_str(raw).unwrap();
        assert!(!resp.result.is_fake);
        assert_eq!(resp.result.model_used, "xception");
        assert_eq!(resp.processing_time_ms, 97.0);
    }

    #[test]
    fn test_frame_message_carries_jpeg() {
        let frame = Surface::filled(32, 24, [120, 40, 200, 255]);
        let ClientMessage::Frame { data, timestamp } = frame_message(&frame).unwrap();
        assert!(timestamp > 0);
        let bytes = BASE64.decode(data).unwrap();
        // JPEG SOI marker
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        // Payload decodes back to the frame's dimensions.
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 32);
        assert_eq!(decoded.height(), 24);
    }

    #[test]
    fn test_session_endpoint_format() {
        let session = StreamSession::new();
        let endpoint = session.endpoint("wss://api.example.com/");
        assert_eq!(
            endpoint,
            format!("wss://api.example.com/ws/{}", session.id())
        );
    }

    #[test]
    fn test_sessions_are_unique() {
        assert_ne!(StreamSession::new().id(), StreamSession::new().id());
    }
}

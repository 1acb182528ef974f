use std::path::PathBuf;

/// Render defaults, loaded from `FACEVEIL_*` environment variables.
/// Explicit CLI flags take precedence over these.
pub struct RenderDefaults {
    /// Output frame width in pixels.
    pub width: u32,
    /// Output frame height in pixels.
    pub height: u32,
    /// Number of frames to render.
    pub frames: u32,
    /// Overlay opacity in [0, 1].
    pub blend: f32,
    /// Feather band width in pixels.
    pub feather: f32,
    /// Directory for rendered PNG frames.
    pub out_dir: PathBuf,
}

impl RenderDefaults {
    pub fn from_env() -> Self {
        Self {
            width: env_u32("FACEVEIL_WIDTH", 640),
            height: env_u32("FACEVEIL_HEIGHT", 480),
            frames: env_u32("FACEVEIL_FRAMES", 30),
            blend: env_f32("FACEVEIL_BLEND", 0.95),
            feather: env_f32("FACEVEIL_FEATHER", 20.0),
            out_dir: std::env::var("FACEVEIL_OUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("frames")),
        }
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

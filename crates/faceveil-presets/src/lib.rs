//! faceveil-presets — Built-in target face catalog.
//!
//! Each preset is a stylized cartoon face painted procedurally on a
//! transparent 256×256 canvas from a fixed palette, then PNG-encoded
//! into a `data:` URI the compositor can load. The catalog is
//! constructed by an explicit initialization function and is immutable
//! afterwards; entries and their order are stable across calls.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{imageops, Rgba, RgbaImage};
use thiserror::Error;

use faceveil_core::TargetFace;

const CANVAS_SIZE: u32 = 256;
const THUMBNAIL_SIZE: u32 = 64;

#[derive(Error, Debug)]
pub enum PresetError {
    #[error("preset image encode failed: {0}")]
    Encode(#[from] image::ImageError),
}

struct Palette {
    id: &'static str,
    name: &'static str,
    skin: [u8; 4],
    hair: [u8; 4],
    eye: [u8; 4],
    lip: [u8; 4],
}

const PALETTES: &[Palette] = &[
    Palette {
        id: "aria",
        name: "Aria",
        skin: [236, 188, 145, 255],
        hair: [72, 48, 28, 255],
        eye: [52, 86, 34, 255],
        lip: [176, 82, 87, 255],
    },
    Palette {
        id: "sage",
        name: "Sage",
        skin: [198, 140, 96, 255],
        hair: [24, 20, 18, 255],
        eye: [60, 42, 26, 255],
        lip: [140, 62, 64, 255],
    },
    Palette {
        id: "nova",
        name: "Nova",
        skin: [246, 212, 178, 255],
        hair: [188, 62, 30, 255],
        eye: [44, 98, 128, 255],
        lip: [196, 96, 110, 255],
    },
    Palette {
        id: "kai",
        name: "Kai",
        skin: [172, 116, 74, 255],
        hair: [38, 34, 40, 255],
        eye: [30, 28, 26, 255],
        lip: [122, 56, 52, 255],
    },
];

/// Build the fixed catalog of selectable target faces.
///
/// Intended to be called once from the hosting application's startup
/// path; the returned list is the complete, ordered catalog.
pub fn builtin_faces() -> Result<Vec<TargetFace>, PresetError> {
    PALETTES
        .iter()
        .map(|palette| {
            let img = paint_face(palette);
            let thumb = imageops::resize(
                &img,
                THUMBNAIL_SIZE,
                THUMBNAIL_SIZE,
                imageops::FilterType::Triangle,
            );
            Ok(TargetFace {
                id: palette.id.to_string(),
                name: palette.name.to_string(),
                image_url: png_data_uri(&img)?,
                thumbnail_url: png_data_uri(&thumb)?,
            })
        })
        .collect()
}

/// Paint one stylized face: head, hair cap, eyes with pupils, nose
/// shadow and mouth on a transparent canvas.
fn paint_face(palette: &Palette) -> RgbaImage {
    let mut img = RgbaImage::new(CANVAS_SIZE, CANVAS_SIZE);

    // Head
    fill_ellipse(&mut img, 128.0, 140.0, 88.0, 104.0, palette.skin);
    // Hair cap over the upper head
    fill_half_ellipse(&mut img, 128.0, 92.0, 94.0, 72.0, palette.hair);
    // Eye whites and pupils
    for ex in [95.0, 161.0] {
        fill_ellipse(&mut img, ex, 128.0, 16.0, 10.0, [255, 255, 255, 255]);
        fill_ellipse(&mut img, ex, 128.0, 6.0, 6.0, palette.eye);
    }
    // Nose shadow
    fill_ellipse(&mut img, 128.0, 158.0, 6.0, 11.0, shade(palette.skin, 0.85));
    // Mouth
    fill_ellipse(&mut img, 128.0, 194.0, 26.0, 12.0, palette.lip);

    img
}

fn shade(color: [u8; 4], factor: f32) -> [u8; 4] {
    [
        (color[0] as f32 * factor) as u8,
        (color[1] as f32 * factor) as u8,
        (color[2] as f32 * factor) as u8,
        color[3],
    ]
}

fn fill_ellipse(img: &mut RgbaImage, cx: f32, cy: f32, rx: f32, ry: f32, color: [u8; 4]) {
    fill_ellipse_clipped(img, cx, cy, rx, ry, color, f32::INFINITY);
}

/// Upper half only: pixels below `cy` are left untouched.
fn fill_half_ellipse(img: &mut RgbaImage, cx: f32, cy: f32, rx: f32, ry: f32, color: [u8; 4]) {
    fill_ellipse_clipped(img, cx, cy, rx, ry, color, cy);
}

fn fill_ellipse_clipped(
    img: &mut RgbaImage,
    cx: f32,
    cy: f32,
    rx: f32,
    ry: f32,
    color: [u8; 4],
    max_y: f32,
) {
    let x0 = (cx - rx).floor().max(0.0) as u32;
    let x1 = ((cx + rx).ceil() as i64).min(img.width() as i64).max(0) as u32;
    let y0 = (cy - ry).floor().max(0.0) as u32;
    let y1 = ((cy + ry).ceil() as i64).min(img.height() as i64).max(0) as u32;

    for y in y0..y1 {
        let py = y as f32 + 0.5;
        if py > max_y {
            continue;
        }
        for x in x0..x1 {
            let px = x as f32 + 0.5;
            let nx = (px - cx) / rx;
            let ny = (py - cy) / ry;
            if nx * nx + ny * ny <= 1.0 {
                img.put_pixel(x, y, Rgba(color));
            }
        }
    }
}

fn png_data_uri(img: &RgbaImage) -> Result<String, PresetError> {
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img.clone())
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(format!("data:image/png;base64,{}", BASE64.encode(buf)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use faceveil_core::{FaceCompositor, FaceGeometry, Surface};

    fn decode_data_uri(uri: &str) -> RgbaImage {
        let payload = uri.split_once(";base64,").unwrap().1;
        let bytes = BASE64.decode(payload).unwrap();
        image::load_from_memory(&bytes).unwrap().to_rgba8()
    }

    #[test]
    fn test_catalog_order_and_ids_are_stable() {
        let faces = builtin_faces().unwrap();
        let ids: Vec<&str> = faces.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["aria", "sage", "nova", "kai"]);
    }

    #[test]
    fn test_catalog_is_deterministic() {
        assert_eq!(builtin_faces().unwrap(), builtin_faces().unwrap());
    }

    #[test]
    fn test_images_decode_at_expected_sizes() {
        for face in builtin_faces().unwrap() {
            let img = decode_data_uri(&face.image_url);
            assert_eq!(img.dimensions(), (CANVAS_SIZE, CANVAS_SIZE));
            let thumb = decode_data_uri(&face.thumbnail_url);
            assert_eq!(thumb.dimensions(), (THUMBNAIL_SIZE, THUMBNAIL_SIZE));
        }
    }

    #[test]
    fn test_face_is_painted_on_transparent_canvas() {
        let faces = builtin_faces().unwrap();
        let img = decode_data_uri(&faces[0].image_url);
        // Canvas corners stay transparent; the head center carries the
        // preset's skin tone.
        assert_eq!(img.get_pixel(0, 0).0[3], 0);
        assert_eq!(img.get_pixel(255, 255).0[3], 0);
        assert_eq!(img.get_pixel(128, 145).0, PALETTES[0].skin);
    }

    #[test]
    fn test_presets_have_distinct_palettes() {
        let faces = builtin_faces().unwrap();
        let centers: Vec<[u8; 4]> = faces
            .iter()
            .map(|f| decode_data_uri(&f.image_url).get_pixel(128, 145).0)
            .collect();
        for i in 0..centers.len() {
            for j in (i + 1)..centers.len() {
                assert_ne!(centers[i], centers[j], "presets {i} and {j} share a skin tone");
            }
        }
    }

    #[tokio::test]
    async fn test_preset_loads_into_compositor() {
        let faces = builtin_faces().unwrap();
        let comp = FaceCompositor::new();
        assert!(comp.load_target(&faces[0]).await.unwrap());

        let geom = FaceGeometry::synthesize();
        let source = Surface::filled(320, 240, [0, 0, 0, 255]);
        let mut output = Surface::new(320, 240);
        comp.composite(&source, Some(&geom), &mut output);

        // The face ellipse center picks up the overlay.
        assert_ne!(output.pixel(160, 108), source.pixel(160, 108));
        // Far corner stays pass-through.
        assert_eq!(output.pixel(5, 5), source.pixel(5, 5));
    }
}

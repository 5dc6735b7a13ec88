use image::{codecs::jpeg::JpegEncoder, ImageError, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_circle_mut;
use leaf_detection::BoundingBox;

/// Circle drawn over one detected region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub center: (i32, i32),
    pub radius: i32,
    pub color: Rgb<u8>,
}

impl Marker {
    /// Centered on the box, with a radius of a quarter of its longer side.
    pub fn from_box(bbox: &BoundingBox, color: Rgb<u8>) -> Self {
        let (cx, cy) = bbox.center();
        let radius = bbox.width().max(bbox.height()) / 4.;
        Self {
            center: (cx as i32, cy as i32),
            radius: radius.max(0.) as i32,
            color,
        }
    }
}

/// Draws every marker as a hollow circle `thickness` pixels wide. Pixels falling
/// outside the image are skipped.
pub fn draw_markers(image: &mut RgbImage, markers: &[Marker], thickness: u32) {
    let thickness = thickness.max(1) as i32;
    for marker in markers {
        for offset in 0..thickness {
            let radius = marker.radius + offset - thickness / 2;
            if radius < 0 {
                continue;
            }
            draw_hollow_circle_mut(image, marker.center, radius, marker.color);
        }
    }
}

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder.encode_image(image)?;
    Ok(buf)
}

use reframe_core::TransformSpec;

/// Region of the source image, in pixels, that is scaled onto the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn is_full(&self, img_width: u32, img_height: u32) -> bool {
        self.x == 0 && self.y == 0 && self.width == img_width && self.height == img_height
    }
}

/// Largest centered region of an `img_width x img_height` image whose aspect
/// ratio equals the target's.
///
/// A source relatively wider than the target loses columns on both sides;
/// otherwise (taller, or exactly the same ratio) it loses rows top and
/// bottom. The ratio comparison is exact, so equal ratios never crop.
pub fn crop_rect(img_width: u32, img_height: u32, spec: &TransformSpec) -> CropRect {
    let tw = spec.target_width() as u64;
    let th = spec.target_height() as u64;
    let iw = img_width as u64;
    let ih = img_height as u64;

    // img_w / img_h > tw / th, without floating point.
    if iw * th > tw * ih {
        let width = round_div(ih * tw, th).max(1).min(iw);
        CropRect {
            x: ((iw - width) / 2) as u32,
            y: 0,
            width: width as u32,
            height: img_height,
        }
    } else {
        let height = round_div(iw * th, tw).max(1).min(ih);
        CropRect {
            x: 0,
            y: ((ih - height) / 2) as u32,
            width: img_width,
            height: height as u32,
        }
    }
}

fn round_div(n: u64, d: u64) -> u64 {
    (n + d / 2) / d
}

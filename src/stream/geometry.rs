//! EXIF-aware geometry resolution.
//!
//! Combines the requested rotation and mirroring with the source EXIF
//! orientation, and turns the requested `w`/`h` into pixel counts.

use tracing::debug;

use crate::codec::Transform;
use crate::query::{Coordinate, QueryStore};

/// Largest width or height accepted for a resolved dimension.
pub const MAX_COORD: i32 = 10_000_000;

/// Transform implied by an EXIF orientation tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExifTransform {
    /// Degrees added to the requested rotation
    pub rotate: i32,
    /// Toggle the vertical mirror
    pub flip: bool,
    /// Toggle the horizontal mirror
    pub flop: bool,
}

/// Overlay for orientation tags 2..=8; any other value is a no-op.
pub fn exif_transform(orientation: u16) -> ExifTransform {
    let (rotate, flip, flop) = match orientation {
        2 => (0, false, true),
        3 => (180, false, false),
        4 => (180, false, true),
        5 => (270, true, false),
        6 => (90, false, false),
        7 => (90, true, false),
        8 => (270, false, false),
        _ => (0, false, false),
    };
    ExifTransform { rotate, flip, flop }
}

/// Normalize an angle in degrees into `[0, 360)`.
pub fn normalize_angle(angle: i32) -> i32 {
    angle.rem_euclid(360)
}

/// Fully resolved geometry of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub angle: i32,
    pub flip: bool,
    pub flop: bool,
    /// Target width before rotation, 0 = auto
    pub width: i32,
    /// Target height before rotation, 0 = auto
    pub height: i32,
    pub input_width: i32,
    pub input_height: i32,
}

impl Geometry {
    /// The transform handed to the codec.
    pub fn transform(&self) -> Transform {
        Transform {
            width: self.width as u32,
            height: self.height as u32,
            angle: self.angle as u32,
            flip: self.flip,
            flop: self.flop,
        }
    }
}

/// Resolve rotation, mirroring and target size for an image of
/// `width` x `height` with the given EXIF `orientation`.
///
/// Writes `angle`, `flip`, `flop`, `w`, `h`, `input_width` and
/// `input_height` back into `query`. Never fails: invalid inputs fall back to
/// their defaults and sizes are clamped to `[0, MAX_COORD]`.
pub fn resolve_geometry(
    query: &mut QueryStore,
    width: u32,
    height: u32,
    orientation: u16,
) -> Geometry {
    let rotate = query.get_if("ro", |r: &i32| r % 90 == 0, 0);
    let mut flip = query.get("flip", false);
    let mut flop = query.get("flop", false);

    let exif = exif_transform(orientation);
    let rotate = rotate.saturating_add(exif.rotate);
    // The EXIF mirror toggles the requested one
    flip ^= exif.flip;
    flop ^= exif.flop;
    let angle = normalize_angle(rotate);

    let input_width = i32::try_from(width).unwrap_or(i32::MAX);
    let input_height = i32::try_from(height).unwrap_or(i32::MAX);

    let unset = Coordinate::Pixels(0);
    let mut target_width = query.get("w", unset).to_pixels(input_width);
    let mut target_height = query.get("h", unset).to_pixels(input_height);

    let pixel_ratio = query.get("dpr", -1.0f32);
    if (0.0..=8.0).contains(&pixel_ratio) {
        target_width = scale(target_width, pixel_ratio);
        target_height = scale(target_height, pixel_ratio);
    }

    // Rotation is applied after resizing, so a 90/270 orientation needs the
    // transposed target box.
    if orientation > 4 && !query.get("precrop", false) {
        std::mem::swap(&mut target_width, &mut target_height);
    }

    let geometry = Geometry {
        angle,
        flip,
        flop,
        width: target_width.clamp(0, MAX_COORD),
        height: target_height.clamp(0, MAX_COORD),
        input_width,
        input_height,
    };

    query.update("angle", geometry.angle);
    query.update("flip", geometry.flip);
    query.update("flop", geometry.flop);
    query.update("w", geometry.width);
    query.update("h", geometry.height);
    query.update("input_width", geometry.input_width);
    query.update("input_height", geometry.input_height);

    debug!(
        orientation,
        angle = geometry.angle,
        flip = geometry.flip,
        flop = geometry.flop,
        width = geometry.width,
        height = geometry.height,
        "Resolved geometry"
    );

    geometry
}

fn scale(value: i32, ratio: f32) -> i32 {
    let scaled = (f64::from(value) * f64::from(ratio)).round();
    scaled.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
}

//! Pixel to material lookup on a rendered or classified raster.

use image::RgbaImage;
use lithochrome_blend::{Rgb, ShadeKey, ShadePalette};

/// Shade whose exact colour is at `(x, y)`.
///
/// Coordinates outside the image, transparent pixels and colours not in the
/// palette give `None`.
pub fn pick_material(image: &RgbaImage, x: i64, y: i64, palette: &ShadePalette) -> Option<ShadeKey> {
    let x = u32::try_from(x).ok()?;
    let y = u32::try_from(y).ok()?;
    let px = image.get_pixel_checked(x, y)?;
    if px[3] == 0 {
        return None;
    }
    palette.lookup(Rgb::new(px[0], px[1], px[2]))
}

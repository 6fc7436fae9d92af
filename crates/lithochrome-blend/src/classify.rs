//! Nearest-shade classification of source pixels.

use std::collections::{BTreeMap, HashMap};

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::ladder::{ShadeKey, ShadePalette};
use crate::model::lab_coords;
use crate::rgb::Rgb;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// A raster whose opaque pixels all carry an exact palette shade.
#[derive(Debug, Clone)]
pub struct ClassifiedImage {
    image: RgbaImage,
    keys: Vec<Option<ShadeKey>>,
}

impl ClassifiedImage {
    /// Rebuild keys from a raster that already holds palette colours.
    ///
    /// Pixels whose colour is not in the palette, and transparent pixels,
    /// become transparent with no key.
    pub fn from_raster(image: &RgbaImage, palette: &ShadePalette) -> Self {
        let index = palette.index();
        let (width, height) = image.dimensions();
        let mut out = RgbaImage::new(width, height);
        let mut keys = Vec::with_capacity(width as usize * height as usize);
        for (x, y, px) in image.enumerate_pixels() {
            let key = if px[3] == 0 {
                None
            } else {
                index.get(&Rgb::new(px[0], px[1], px[2])).copied()
            };
            if let Some(k) = key {
                let c = palette.shade(k).unwrap_or_default();
                out.put_pixel(x, y, Rgba(c.to_rgba()));
            }
            keys.push(key);
        }
        Self { image: out, keys }
    }

    /// The classified raster.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Take the raster.
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Keys in row-major order.
    pub fn keys(&self) -> &[Option<ShadeKey>] {
        &self.keys
    }

    /// Key of one pixel, `None` when transparent or out of bounds.
    pub fn key_at(&self, x: u32, y: u32) -> Option<ShadeKey> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        self.keys[y as usize * self.width() as usize + x as usize]
    }

    /// Pixel count per shade.
    pub fn histogram(&self) -> BTreeMap<ShadeKey, usize> {
        let mut counts = BTreeMap::new();
        for key in self.keys.iter().flatten() {
            *counts.entry(*key).or_insert(0) += 1;
        }
        counts
    }
}

/// Index into `shades` of the nearest shade in Lab space.
///
/// Strict comparison keeps the earliest shade on ties.
fn nearest_shade(shades: &[(ShadeKey, Rgb, [f32; 3])], lab: [f32; 3]) -> usize {
    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (i, (_, _, s)) in shades.iter().enumerate() {
        let d = (s[0] - lab[0]).powi(2) + (s[1] - lab[1]).powi(2) + (s[2] - lab[2]).powi(2);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

/// Replace every opaque pixel with its nearest palette shade.
///
/// Rows are classified in parallel; each row remembers colours it has
/// already resolved. Alpha 0 pixels become fully transparent, any other
/// alpha becomes 255.
pub fn classify(image: &RgbaImage, palette: &ShadePalette) -> ClassifiedImage {
    let (width, height) = image.dimensions();
    let shades: Vec<(ShadeKey, Rgb, [f32; 3])> = palette
        .iter()
        .map(|(key, c)| (key, c, lab_coords(c)))
        .collect();

    let rows: Vec<Vec<Option<usize>>> = (0..height)
        .into_par_iter()
        .map(|y| {
            let mut memo: HashMap<[u8; 3], Option<usize>> = HashMap::new();
            (0..width)
                .map(|x| {
                    let px = image.get_pixel(x, y);
                    if px[3] == 0 || shades.is_empty() {
                        return None;
                    }
                    let rgb = [px[0], px[1], px[2]];
                    *memo
                        .entry(rgb)
                        .or_insert_with(|| Some(nearest_shade(&shades, lab_coords(Rgb::from(rgb)))))
                })
                .collect()
        })
        .collect();

    let mut out = RgbaImage::new(width, height);
    let mut keys = Vec::with_capacity(width as usize * height as usize);
    for (y, row) in rows.into_iter().enumerate() {
        for (x, slot) in row.into_iter().enumerate() {
            match slot {
                Some(i) => {
                    let (key, c, _) = shades[i];
                    out.put_pixel(x as u32, y as u32, Rgba(c.to_rgba()));
                    keys.push(Some(key));
                }
                None => {
                    out.put_pixel(x as u32, y as u32, TRANSPARENT);
                    keys.push(None);
                }
            }
        }
    }

    log::debug!(
        "classified {}x{} pixels against {} shades",
        width,
        height,
        shades.len()
    );
    ClassifiedImage { image: out, keys }
}

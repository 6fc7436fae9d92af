//! Translucency model.
//!
//! A single printed layer of a translucent filament lets part of the colour
//! underneath show through. The opacity of one layer is a fitted function of
//! `layer_height / transmission_distance`; stacking `L` layers compounds it.

use palette::{IntoColor, Lab, Srgb};

use crate::rgb::Rgb;

const CURVE_OFFSET: f64 = -1.241_655_7e-2;
const CURVE_LOG_GAIN: f64 = 9.640_795_0e-1;
const CURVE_LOG_RATE: f64 = 3.410_344_7e1;
const CURVE_LINEAR: f64 = -4.155_420_3;

/// Thickness ratio at which the fitted curve peaks. The fit turns back down
/// past this point, so thicker ratios are held at the peak (fully opaque).
const CURVE_PEAK_RATIO: f64 = -CURVE_LOG_GAIN / CURVE_LINEAR - 1.0 / CURVE_LOG_RATE;

/// Opacity in `[0, 1]` of one layer of the given height.
///
/// A non-positive transmission distance means the filament is opaque.
pub fn alpha_from_thickness(layer_height: f64, transmission_distance: f64) -> f64 {
    if transmission_distance <= 0.0 {
        return 1.0;
    }
    let ratio = (layer_height / transmission_distance).min(CURVE_PEAK_RATIO);
    let alpha =
        CURVE_OFFSET + CURVE_LOG_GAIN * (CURVE_LOG_RATE * ratio).ln_1p() + CURVE_LINEAR * ratio;
    alpha.clamp(0.0, 1.0)
}

/// Opacity of `layers` stacked layers that each have opacity `alpha`.
pub fn stacked_alpha(alpha: f64, layers: u32) -> f64 {
    let transmitted = (1.0 - alpha).powi(layers.min(i32::MAX as u32) as i32);
    1.0 - transmitted
}

/// Lay `top` over `base` with opacity `alpha`.
pub fn composite(base: Rgb, top: Rgb, alpha: f64) -> Rgb {
    let mix = |b: u8, t: u8| -> u8 {
        let v = f64::from(b) * (1.0 - alpha) + f64::from(t) * alpha;
        v.round().clamp(0.0, 255.0) as u8
    };
    Rgb::new(mix(base.r, top.r), mix(base.g, top.g), mix(base.b, top.b))
}

/// Euclidean distance in RGB space.
pub fn rgb_distance(a: Rgb, b: Rgb) -> f64 {
    let d = |x: u8, y: u8| f64::from(x) - f64::from(y);
    let (dr, dg, db) = (d(a.r, b.r), d(a.g, b.g), d(a.b, b.b));
    (dr * dr + dg * dg + db * db).sqrt()
}

/// Convert to CIE L*a*b* (D65).
pub fn to_lab(c: Rgb) -> Lab {
    Srgb::new(c.r, c.g, c.b).into_format::<f32>().into_color()
}

/// Lab coordinates as a plain array.
pub fn lab_coords(c: Rgb) -> [f32; 3] {
    let lab = to_lab(c);
    [lab.l, lab.a, lab.b]
}

/// Euclidean distance in Lab space (CIE76 delta E).
pub fn lab_distance(a: &Lab, b: &Lab) -> f32 {
    let (dl, da, db) = (a.l - b.l, a.a - b.a, a.b - b.b);
    (dl * dl + da * da + db * db).sqrt()
}

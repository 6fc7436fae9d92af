//! Vector preview.

use geo::{LineString, MultiPolygon};
use lithochrome_blend::{ShadeKey, ShadePalette};
use lithochrome_contour::LayerStack;

fn ring_to_path(ring: &LineString<f64>, height: f64) -> String {
    let coords = &ring.0;
    // Closed rings repeat the first point.
    let open = match (coords.first(), coords.last()) {
        (Some(a), Some(b)) if coords.len() > 1 && a == b => &coords[..coords.len() - 1],
        _ => &coords[..],
    };
    if open.len() < 3 {
        return String::new();
    }
    let mut path = String::new();
    for (idx, c) in open.iter().enumerate() {
        let cmd = if idx == 0 { 'M' } else { 'L' };
        if idx > 0 {
            path.push(' ');
        }
        path.push_str(&format!("{cmd}{:.2},{:.2}", c.x, height - c.y));
    }
    path.push_str(" Z");
    path
}

fn outline_to_path(outline: &MultiPolygon<f64>, height: f64) -> String {
    outline
        .0
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
        .map(|ring| ring_to_path(ring, height))
        .filter(|d| !d.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// SVG document drawing `stack` in print order.
///
/// Coordinates are source pixels with Y flipped back to SVG's Y down;
/// `scale` gives millimetres per pixel for the document size. Each non-empty
/// pair becomes one even-odd filled path in its shade colour.
pub fn render_svg(
    stack: &LayerStack,
    palette: &ShadePalette,
    image_width: u32,
    image_height: u32,
    scale: f64,
) -> String {
    let (w, h) = (f64::from(image_width), f64::from(image_height));
    let mut svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{:.2}mm\" height=\"{:.2}mm\" viewBox=\"0 0 {image_width} {image_height}\">\n",
        w * scale,
        h * scale
    );
    for (i, ladder) in stack.iter().enumerate() {
        for (rung, outline) in ladder.iter().enumerate() {
            let key = ShadeKey::new(i, rung + 1);
            let Some(color) = palette.shade(key) else {
                log::warn!("no shade for filament {i} x{}, skipping", rung + 1);
                continue;
            };
            let d = outline_to_path(outline, h);
            if d.is_empty() {
                continue;
            }
            svg.push_str(&format!(
                "  <path id=\"f{i}-l{}\" d=\"{d}\" fill=\"{color}\" fill-rule=\"evenodd\"/>\n",
                rung + 1
            ));
        }
    }
    svg.push_str("</svg>\n");
    svg
}

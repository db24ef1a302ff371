use cammap_data::BoundingBox;
use image::{Rgba, RgbaImage};
use std::path::Path;
use tracing::{debug, warn};

const OUTLINE: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Write a copy of the screenshot with detected region outlines drawn
/// on it. Best effort: failures are logged, never propagated.
pub fn save_annotated<'a>(
    screenshot: &RgbaImage,
    regions: impl Iterator<Item = &'a BoundingBox>,
    path: &Path,
) {
    let mut annotated = screenshot.clone();
    let mut count = 0usize;
    for bounds in regions {
        draw_rect(&mut annotated, bounds);
        count += 1;
    }

    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match annotated.save(path) {
        Ok(()) => debug!("debug overlay ({count} regions) -> {}", path.display()),
        Err(e) => warn!("could not save debug overlay: {}", e),
    }
}

fn draw_rect(image: &mut RgbaImage, bounds: &BoundingBox) {
    let (w, h) = image.dimensions();
    let clamp_x = |x: i32| x.clamp(0, w as i32 - 1) as u32;
    let clamp_y = |y: i32| y.clamp(0, h as i32 - 1) as u32;

    let (x1, x2) = (clamp_x(bounds.min.x), clamp_x(bounds.max.x));
    let (y1, y2) = (clamp_y(bounds.min.y), clamp_y(bounds.max.y));

    for x in x1..=x2 {
        image.put_pixel(x, y1, OUTLINE);
        image.put_pixel(x, y2, OUTLINE);
    }
    for y in y1..=y2 {
        image.put_pixel(x1, y, OUTLINE);
        image.put_pixel(x2, y, OUTLINE);
    }
}

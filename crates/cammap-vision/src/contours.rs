use image::{Luma, RgbaImage};
use imageproc::edges::canny;
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::HashMap;
use tracing::debug;

use cammap_data::{BoundingBox, ClickableRegion, Point};

/// Tuning for the visual clickable-region detector.
#[derive(Debug, Clone)]
pub struct ContourConfig {
    pub canny_low: f32,
    pub canny_high: f32,
    /// Components smaller than this many edge pixels are noise.
    pub min_component_area: u32,
    /// Cluster threshold in pixels; when `None` it is derived from the
    /// image diagonal.
    pub cluster_threshold: Option<f64>,
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            canny_low: 30.0,
            canny_high: 200.0,
            min_component_area: 4,
            cluster_threshold: None,
        }
    }
}

/// Default cluster threshold: one percent of each dimension, combined.
pub fn cluster_threshold_for(width: u32, height: u32) -> f64 {
    let wx = width as f64 / 100.0;
    let hy = height as f64 / 100.0;
    (wx * wx + hy * hy).sqrt()
}

/// Find visual clickable-region candidates in a screenshot: edge
/// detection, external component bounding boxes, then agglomerative
/// merging of boxes that sit closer than the cluster threshold.
///
/// Zero detected components is an empty result, not an error.
pub fn detect(image: &RgbaImage, config: &ContourConfig) -> Vec<ClickableRegion> {
    let gray = image::imageops::grayscale(image);
    let edges = canny(&gray, config.canny_low, config.canny_high);

    let raw = component_boxes(&edges, config.min_component_area);
    let threshold = config
        .cluster_threshold
        .unwrap_or_else(|| cluster_threshold_for(image.width(), image.height()));

    let merged = cluster_boxes(raw.clone(), threshold);
    debug!(
        "contour detection: {} components -> {} regions (threshold {:.1}px)",
        raw.len(),
        merged.len(),
        threshold
    );

    merged.into_iter().map(ClickableRegion::from_image).collect()
}

/// Bounding boxes of eight-connected edge components, smallest noise
/// filtered out.
fn component_boxes(edges: &image::GrayImage, min_area: u32) -> Vec<BoundingBox> {
    let labeled = connected_components(edges, Connectivity::Eight, Luma([0u8]));

    let mut extents: HashMap<u32, (u32, u32, u32, u32, u32)> = HashMap::new();
    for (x, y, label) in labeled.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue;
        }
        extents
            .entry(label)
            .and_modify(|(min_x, min_y, max_x, max_y, count)| {
                *min_x = (*min_x).min(x);
                *min_y = (*min_y).min(y);
                *max_x = (*max_x).max(x);
                *max_y = (*max_y).max(y);
                *count += 1;
            })
            .or_insert((x, y, x, y, 1));
    }

    let mut boxes: Vec<BoundingBox> = extents
        .into_values()
        .filter(|(_, _, _, _, count)| *count >= min_area)
        .map(|(min_x, min_y, max_x, max_y, _)| {
            BoundingBox::new(
                Point::new(min_x as i32, min_y as i32),
                Point::new(max_x as i32, max_y as i32),
            )
        })
        .collect();
    // Deterministic order independent of the hash map.
    boxes.sort_by_key(|b| (b.min.y, b.min.x, b.max.y, b.max.x));
    boxes
}

/// Rectangle-gap distance between two boxes: how far apart their edges
/// are along the dominant axis. Negative when the boxes overlap, which
/// means overlapping boxes always merge under any positive threshold
/// (a deliberate rule, see `overlapping_boxes_always_merge`).
pub fn rectangle_gap(a: &BoundingBox, b: &BoundingBox) -> f64 {
    let ca = a.centroid();
    let cb = b.centroid();
    let dx = (ca.x - cb.x).abs() as f64 - (a.width() + b.width()) as f64 / 2.0;
    let dy = (ca.y - cb.y).abs() as f64 - (a.height() + b.height()) as f64 / 2.0;
    dx.max(dy)
}

/// Single-linkage agglomerative clustering: repeatedly union the globally
/// closest pair while the minimum gap is strictly below the threshold.
/// O(n³) worst case, fine for the tens of icons a camera screen shows.
pub fn cluster_boxes(mut boxes: Vec<BoundingBox>, threshold: f64) -> Vec<BoundingBox> {
    while boxes.len() > 1 {
        let mut min_gap = f64::INFINITY;
        let mut min_pair = (0, 0);
        for i in 0..boxes.len() - 1 {
            for j in i + 1..boxes.len() {
                let gap = rectangle_gap(&boxes[i], &boxes[j]);
                if gap < min_gap {
                    min_gap = gap;
                    min_pair = (i, j);
                }
            }
        }

        // Strict inequality: a pair exactly at the threshold stays split.
        if min_gap < threshold {
            let (i, j) = min_pair;
            boxes[i] = boxes[i].union(&boxes[j]);
            boxes.swap_remove(j);
        } else {
            break;
        }
    }
    boxes
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn bbox(x1: i32, y1: i32, x2: i32, y2: i32) -> BoundingBox {
        BoundingBox::new(Point::new(x1, y1), Point::new(x2, y2))
    }

    /// Black frame with filled white squares, enough contrast for Canny.
    fn frame_with_squares(squares: &[(u32, u32, u32)]) -> RgbaImage {
        let mut img = RgbaImage::from_pixel(400, 400, Rgba([0, 0, 0, 255]));
        for &(x0, y0, side) in squares {
            for y in y0..y0 + side {
                for x in x0..x0 + side {
                    img.put_pixel(x, y, Rgba([255, 255, 255, 255]));
                }
            }
        }
        img
    }

    #[test]
    fn test_blank_image_yields_no_regions() {
        let img = RgbaImage::from_pixel(200, 200, Rgba([0, 0, 0, 255]));
        let regions = detect(&img, &ContourConfig::default());
        assert!(regions.is_empty());
    }

    #[test]
    fn test_detects_separated_squares() {
        let img = frame_with_squares(&[(30, 30, 40), (300, 300, 40)]);
        let regions = detect(&img, &ContourConfig::default());
        assert_eq!(regions.len(), 2);
        for r in &regions {
            assert!(r.bounds.width() >= 35 && r.bounds.width() <= 45);
        }
    }

    #[test]
    fn test_merged_count_never_exceeds_raw_count() {
        let raw = vec![
            bbox(0, 0, 10, 10),
            bbox(12, 0, 22, 10),
            bbox(100, 100, 110, 110),
            bbox(115, 100, 125, 110),
        ];
        let merged = cluster_boxes(raw.clone(), 8.0);
        assert!(merged.len() <= raw.len());
    }

    #[test]
    fn test_exact_threshold_distance_is_not_merged() {
        // Gap between the boxes is exactly 10px.
        let boxes = vec![bbox(0, 0, 10, 10), bbox(20, 0, 30, 10)];
        let gap = rectangle_gap(&boxes[0], &boxes[1]);
        assert_eq!(gap, 10.0);
        let merged = cluster_boxes(boxes, 10.0);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_overlapping_boxes_always_merge() {
        let a = bbox(0, 0, 20, 20);
        let b = bbox(10, 10, 30, 30);
        assert!(rectangle_gap(&a, &b) < 0.0);
        // Even a tiny positive threshold merges overlapping boxes.
        let merged = cluster_boxes(vec![a, b], 0.1);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0], bbox(0, 0, 30, 30));
    }

    #[test]
    fn test_clustering_is_idempotent_on_distant_boxes() {
        let boxes = vec![bbox(0, 0, 10, 10), bbox(200, 200, 210, 210)];
        let once = cluster_boxes(boxes.clone(), 20.0);
        assert_eq!(once.len(), 2);
        let twice = cluster_boxes(once.clone(), 20.0);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_single_box_returned_unmerged() {
        let boxes = vec![bbox(5, 5, 15, 15)];
        let merged = cluster_boxes(boxes.clone(), 50.0);
        assert_eq!(merged, boxes);
    }
}

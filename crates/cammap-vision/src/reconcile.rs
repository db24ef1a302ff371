use std::collections::HashMap;
use tracing::debug;

use cammap_data::{BoundingBox, Point};

/// True when the centroid encoded in `key` falls inside `bounds`
/// (inclusive on both axes, so a centroid exactly on the boundary counts
/// as covered). Unparseable keys are never covered.
fn centroid_covered_by(key: &str, bounds: &BoundingBox) -> bool {
    Point::from_key(key).is_some_and(|p| bounds.contains(p))
}

fn covered_by_any(key: &str, tree: &HashMap<String, BoundingBox>) -> bool {
    tree.values().any(|bounds| centroid_covered_by(key, bounds))
}

/// All tree regions, plus the image regions no tree box covers.
/// Tree-sourced names are authoritative; image-only detections fill the
/// gaps the accessibility tree missed (unlabeled icons).
pub fn merge(
    image: &HashMap<String, BoundingBox>,
    tree: &HashMap<String, BoundingBox>,
) -> HashMap<String, BoundingBox> {
    let mut merged = tree.clone();
    merged.extend(
        image
            .iter()
            .filter(|(key, _)| !covered_by_any(key, tree))
            .map(|(key, bounds)| (key.clone(), *bounds)),
    );
    debug!(
        "reconcile: {} image + {} tree -> {} regions",
        image.len(),
        tree.len(),
        merged.len()
    );
    merged
}

/// Only the image regions no tree box covers: the purely-visual elements,
/// such as zoom-level buttons the accessibility tree does not report.
pub fn subtract(
    image: &HashMap<String, BoundingBox>,
    tree: &HashMap<String, BoundingBox>,
) -> HashMap<String, BoundingBox> {
    image
        .iter()
        .filter(|(key, _)| !covered_by_any(key, tree))
        .map(|(key, bounds)| (key.clone(), *bounds))
        .collect()
}

/// Key a set of boxes by their centroid string, the form both merge
/// inputs use.
pub fn by_centroid(boxes: impl IntoIterator<Item = BoundingBox>) -> HashMap<String, BoundingBox> {
    boxes
        .into_iter()
        .map(|b| (b.centroid_key(), b))
        .collect()
}

use serde::{Deserialize, Serialize};

/// Integer screen coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// String form used as a dictionary key for cross-source matching.
    /// Not a stable identity: recomputed on every capture.
    pub fn key(&self) -> String {
        format!("{}:{}", self.x, self.y)
    }

    /// Parse a `"x:y"` centroid key back into a point.
    pub fn from_key(key: &str) -> Option<Self> {
        let (x, y) = key.split_once(':')?;
        Some(Self {
            x: x.parse().ok()?,
            y: y.parse().ok()?,
        })
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Axis-aligned bounding box. Invariant: `min.x <= max.x` and
/// `min.y <= max.y`; the constructor normalizes its corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    pub fn new(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn width(&self) -> i32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> i32 {
        self.max.y - self.min.y
    }

    pub fn centroid(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) / 2,
            (self.min.y + self.max.y) / 2,
        )
    }

    /// Centroid rendered as a `"x:y"` dictionary key.
    pub fn centroid_key(&self) -> String {
        self.centroid().key()
    }

    /// Inclusive on both axes: a point on the boundary counts as inside.
    pub fn contains(&self, p: Point) -> bool {
        self.min.x <= p.x && p.x <= self.max.x && self.min.y <= p.y && p.y <= self.max.y
    }

    /// Smallest box enclosing both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }
}

/// Where a clickable-region candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionSource {
    Image,
    AccessibilityTree,
    Ocr,
}

/// A detected candidate screen area a user could tap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickableRegion {
    pub bounds: BoundingBox,
    pub label: Option<String>,
    pub source: RegionSource,
}

impl ClickableRegion {
    pub fn from_image(bounds: BoundingBox) -> Self {
        Self {
            bounds,
            label: None,
            source: RegionSource::Image,
        }
    }

    pub fn from_tree(label: impl Into<String>, bounds: BoundingBox) -> Self {
        Self {
            bounds,
            label: Some(label.into()),
            source: RegionSource::AccessibilityTree,
        }
    }

    pub fn from_ocr(label: impl Into<String>, bounds: BoundingBox) -> Self {
        Self {
            bounds,
            label: Some(label.into()),
            source: RegionSource::Ocr,
        }
    }
}

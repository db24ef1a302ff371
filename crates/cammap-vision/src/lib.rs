//! Screen understanding for the camera mapper: contour-based region
//! detection, accessibility-tree parsing, reconciliation of the two
//! views, animation timing analysis, and optional OCR labeling.

pub mod contours;
pub mod ocr;
pub mod reconcile;
pub mod timing;
pub mod ui_tree;

pub use contours::{cluster_threshold_for, ContourConfig};
pub use ocr::{TesseractRecognizer, TextRecognizer};
pub use timing::AnimationInterval;
pub use ui_tree::{ParseError, ParsedTree};

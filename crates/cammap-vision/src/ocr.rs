use cammap_data::{normalize_name, BoundingBox, ClickableRegion, Point};
use image::{GrayImage, RgbaImage};
use std::process::Command;
use tracing::{debug, warn};

/// Positioned text recognition over a screenshot. Used to label
/// contour-detected regions the accessibility tree says nothing about.
pub trait TextRecognizer: Send + Sync {
    fn is_available(&self) -> bool;
    fn recognize(&self, image: &RgbaImage) -> Vec<ClickableRegion>;
}

/// Tesseract-backed recognizer, shelling out to the `tesseract` binary.
/// Falls back gracefully when Tesseract is not installed.
pub struct TesseractRecognizer {
    tesseract_available: bool,
    temp_dir: std::path::PathBuf,
}

impl TesseractRecognizer {
    pub fn new() -> Self {
        let tesseract_available = check_tesseract();
        if tesseract_available {
            debug!("Tesseract OCR available");
        } else {
            warn!("Tesseract not found. OCR labeling disabled. Install with: apt install tesseract-ocr");
        }

        let temp_dir = std::env::temp_dir().join("camera_mapper_ocr");
        let _ = std::fs::create_dir_all(&temp_dir);

        Self {
            tesseract_available,
            temp_dir,
        }
    }

    /// Run Tesseract in TSV mode and collect positioned words.
    fn run_tesseract(&self, image: &GrayImage) -> Option<Vec<ClickableRegion>> {
        let temp_path = self.temp_dir.join("ocr_input.png");
        if image.save(&temp_path).is_err() {
            return None;
        }

        let output = Command::new("tesseract")
            .arg(&temp_path)
            .arg("stdout")
            .arg("--psm")
            .arg("11") // Sparse text: menu labels are scattered words
            .arg("tsv")
            .output()
            .ok()?;

        if !output.status.success() {
            return None;
        }

        let text = String::from_utf8(output.stdout).ok()?;
        Some(parse_tsv(&text))
    }
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn is_available(&self) -> bool {
        self.tesseract_available
    }

    fn recognize(&self, image: &RgbaImage) -> Vec<ClickableRegion> {
        if !self.tesseract_available {
            return Vec::new();
        }
        let gray = image::imageops::grayscale(image);
        let words = self.run_tesseract(&gray).unwrap_or_default();
        debug!("OCR found {} positioned word(s)", words.len());
        words
    }
}

/// Parse Tesseract TSV output. Word rows are level 5 with columns
/// `level page block par line word left top width height conf text`.
fn parse_tsv(tsv: &str) -> Vec<ClickableRegion> {
    let mut regions = Vec::new();
    for line in tsv.lines().skip(1) {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let (Ok(left), Ok(top), Ok(width), Ok(height)) = (
            cols[6].parse::<i32>(),
            cols[7].parse::<i32>(),
            cols[8].parse::<i32>(),
            cols[9].parse::<i32>(),
        ) else {
            continue;
        };
        let conf = cols[10].parse::<f64>().unwrap_or(-1.0);
        let word = normalize_name(cols[11]);
        if conf <= 0.0 || word.is_empty() {
            continue;
        }
        let bounds = BoundingBox::new(
            Point::new(left, top),
            Point::new(left + width, top + height),
        );
        regions.push(ClickableRegion::from_ocr(word, bounds));
    }
    regions
}

/// Check if Tesseract is installed and accessible.
fn check_tesseract() -> bool {
    Command::new("tesseract")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tsv_word_rows() {
        let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
                   1\t1\t0\t0\t0\t0\t0\t0\t100\t100\t-1\t\n\
                   5\t1\t1\t1\t1\t1\t10\t20\t40\t12\t91.5\tPortrait\n\
                   5\t1\t1\t1\t1\t2\t60\t20\t30\t12\t-1\t\n\
                   5\t1\t1\t1\t1\t3\t10\t40\t40\t12\t88.0\tFlash";
        let regions = parse_tsv(tsv);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].label.as_deref(), Some("portrait"));
        assert_eq!(regions[0].bounds.min, Point::new(10, 20));
        assert_eq!(regions[0].bounds.max, Point::new(50, 32));
        assert_eq!(regions[1].label.as_deref(), Some("flash"));
    }

    #[test]
    fn test_parse_tsv_skips_malformed_rows() {
        let tsv = "header\n5\t1\t1\n5\t1\t1\t1\t1\t1\tx\t20\t40\t12\t90\tword";
        assert!(parse_tsv(tsv).is_empty());
    }
}

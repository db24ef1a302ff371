use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::catalogue::{ActionKind, ItemKind};

/// Reference camera the device is expected to start in.
pub const BASE_CAM: &str = "main";
/// Reference mode the device is expected to start in.
pub const BASE_MODE: &str = "photo";

/// Name fragments used to locate the camera-switch control.
pub const SWITCH_CAM_NAMES: &[&str] = &["switch", "selfie", "main"];
/// Name fragments used to locate the shutter control.
pub const CAPTURE_NAMES: &[&str] = &["shutter", "take_picture", "take_photo", "capture"];
/// Name fragments used to locate the aspect-ratio control.
pub const ASPECT_RATIO_NAMES: &[&str] = &["aspect_ratio", "ratio", "aspect", "3:4", "16:9", "1:1", "full"];
/// Name fragments used to locate the flash control.
pub const FLASH_NAMES: &[&str] = &["flash", "torch"];
/// Name fragments used to locate the portrait-mode control.
pub const PORTRAIT_NAMES: &[&str] = &["portrait", "bokeh", "blur"];
/// Name fragments of the overflow/quick-control menu a feature may hide behind.
pub const OVERFLOW_MENU_NAMES: &[&str] = &["menu", "more", "options", "expand", "quick"];

/// UI chrome that is never part of the camera controls being mapped.
pub const CHROME_DENYLIST: &[&str] = &[
    "back", "overview", "home", "night", "timer", "settings", "config", "filter", "google",
    "lens", "gallery",
];

/// The cross-product state space to explore, loaded once and immutable
/// for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRequirements {
    pub cams: Vec<String>,
    pub modes: Vec<String>,
    pub items: Vec<ItemKind>,
    pub actions: Vec<ActionKind>,
}

impl Default for MappingRequirements {
    fn default() -> Self {
        Self {
            cams: vec!["main".into(), "selfie".into()],
            modes: vec!["photo".into(), "portrait".into()],
            items: vec![
                ItemKind::Cam,
                ItemKind::Mode,
                ItemKind::AspectRatio,
                ItemKind::Flash,
                ItemKind::TakePicture,
                ItemKind::Touch,
            ],
            actions: vec![ActionKind::ClickMenu, ActionKind::ClickAction],
        }
    }
}

impl MappingRequirements {
    /// Load requirements from a JSON file, falling back to the built-in
    /// defaults when none exists.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("no requirements file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let reqs: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        tracing::info!(
            "loaded requirements: {} cams, {} modes, {} items",
            reqs.cams.len(),
            reqs.modes.len(),
            reqs.items.len()
        );
        Ok(reqs)
    }

    /// The `(cam, mode)` predicate for the base screen.
    pub fn base_requirement(&self) -> Requirement {
        Requirement::single(BASE_CAM, BASE_MODE)
    }

    /// The predicate covering every cam and every mode, for commands valid
    /// on all screens.
    pub fn all_requirement(&self) -> Requirement {
        Requirement {
            cam: self.cams.join(","),
            mode: self.modes.join(","),
        }
    }
}

/// The `(cam, mode)` pair under which a recorded command is valid.
/// Both fields are comma-joined value lists matched by substring, which
/// keeps the on-disk form identical to the checkpoint schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub cam: String,
    pub mode: String,
}

impl Requirement {
    pub fn single(cam: &str, mode: &str) -> Self {
        Self {
            cam: cam.to_string(),
            mode: mode.to_string(),
        }
    }

    /// True when this predicate admits the given cam and mode.
    pub fn admits(&self, cam: &str, mode: &str) -> bool {
        self.cam.contains(cam) && self.mode.contains(mode)
    }
}

/// Normalize a UI element name the way tree names are derived: trimmed,
/// lowercased, spaces replaced with underscores.
pub fn normalize_name(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_space() {
        let reqs = MappingRequirements::default();
        assert_eq!(reqs.cams, vec!["main", "selfie"]);
        assert_eq!(reqs.modes, vec!["photo", "portrait"]);
        assert!(reqs.items.contains(&ItemKind::Touch));
    }

    #[test]
    fn test_requirement_admits_by_substring() {
        let all = MappingRequirements::default().all_requirement();
        assert!(all.admits("main", "photo"));
        assert!(all.admits("selfie", "portrait"));
        let base = Requirement::single("main", "photo");
        assert!(base.admits("main", "photo"));
        assert!(!base.admits("selfie", "photo"));
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Switch Camera "), "switch_camera");
        assert_eq!(normalize_name("FLASH"), "flash");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let reqs = MappingRequirements::load(Path::new("/nonexistent/reqs.json")).unwrap();
        assert_eq!(reqs.cams.len(), 2);
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use cammap_capture::{Device, DeviceProperties};
use cammap_data::{BoundingBox, CommandCatalogue};
use cammap_vision::{contours, reconcile, ContourConfig, ParsedTree, TextRecognizer};
use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::annotate::Annotator;
use crate::config::MapperConfig;
use crate::error::MapperError;
use crate::overlay;

/// Everything captured and derived from the current screen. Rebuilt on
/// every capture; centroid keys are not stable across captures.
pub struct CapturedScreen {
    pub screenshot: RgbaImage,
    pub tree: ParsedTree,
    /// Tree regions plus uncovered image detections, keyed by centroid.
    pub reconciled: HashMap<String, BoundingBox>,
    /// Image-only detections no tree box covers.
    pub visual_only: HashMap<String, BoundingBox>,
}

/// The in-memory model the state machine mutates. Spans one process run;
/// rebuilt from the checkpoint and constructor arguments on restart.
pub struct SessionContext {
    pub config: MapperConfig,
    pub device: Arc<dyn Device>,
    pub annotator: Arc<dyn Annotator>,
    pub recognizer: Option<Arc<dyn TextRecognizer>>,

    pub catalogue: CommandCatalogue,
    pub step: u32,
    pub error: Option<MapperError>,

    pub open_attempts: u32,
    pub camera_foregrounded: bool,
    pub properties: Option<DeviceProperties>,
    pub screen: Option<CapturedScreen>,
}

impl SessionContext {
    /// Build a session, starting fresh at step 0 or resuming from the
    /// previous step's checkpoint.
    pub fn new(
        config: MapperConfig,
        device: Arc<dyn Device>,
        annotator: Arc<dyn Annotator>,
        recognizer: Option<Arc<dyn TextRecognizer>>,
    ) -> Result<Self, MapperError> {
        let empty = CommandCatalogue::for_requirements(&config.requirements);
        let catalogue =
            crate::checkpoint::initial_catalogue(&config.tmp_dir, config.start_step, empty)?;
        let step = config.start_step;
        Ok(Self {
            config,
            device,
            annotator,
            recognizer,
            catalogue,
            step,
            error: None,
            open_attempts: 0,
            camera_foregrounded: false,
            properties: None,
            screen: None,
        })
    }

    /// Record a failure in the single session-error slot. The first
    /// recorded error wins; later ones are logged and dropped.
    pub fn record_error(&mut self, error: MapperError) {
        if self.error.is_some() {
            warn!("dropping secondary error: {}", error);
            return;
        }
        warn!("session error recorded: {}", error);
        self.error = Some(error);
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Capture the screen and the accessibility dump, run detection and
    /// reconciliation, and stash the result as the current screen.
    pub fn capture_and_process(&mut self) -> Result<(), MapperError> {
        let screenshot = self.device.capture_screenshot()?;
        let xml = self.device.capture_ui_tree()?;
        let tree = cammap_vision::ui_tree::clickable_elements(&xml)?;

        let detected = contours::detect(&screenshot, &ContourConfig::default());
        let image_regions =
            reconcile::by_centroid(detected.iter().map(|r| r.bounds));
        let reconciled = reconcile::merge(&image_regions, &tree.by_centroid);
        let visual_only = reconcile::subtract(&image_regions, &tree.by_centroid);

        info!(
            "screen processed: {} tree, {} image, {} reconciled clickables",
            tree.by_name.len(),
            image_regions.len(),
            reconciled.len()
        );
        if reconciled.is_empty() {
            return Err(MapperError::EmptyScreen);
        }

        if self.config.debug_overlays {
            let path = self
                .config
                .tmp_dir
                .join(format!("screen_step_{}.png", self.step));
            overlay::save_annotated(&screenshot, reconciled.values(), &path);
        }

        self.screen = Some(CapturedScreen {
            screenshot,
            tree,
            reconciled,
            visual_only,
        });
        Ok(())
    }

    /// The current screen, or an error when no capture has happened yet.
    pub fn screen(&self) -> Result<&CapturedScreen, MapperError> {
        self.screen
            .as_ref()
            .ok_or_else(|| MapperError::Other("no captured screen".into()))
    }

    pub fn properties(&self) -> Result<&DeviceProperties, MapperError> {
        self.properties
            .as_ref()
            .ok_or_else(|| MapperError::Connection("no device properties".into()))
    }

    /// Remove the per-run scratch directory. Failures are logged only.
    pub fn clean_tmp_dir(&self) {
        if let Err(e) = std::fs::remove_dir_all(&self.config.tmp_dir) {
            debug!("tmp dir cleanup skipped: {}", e);
        }
    }
}

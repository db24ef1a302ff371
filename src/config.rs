use cammap_data::MappingRequirements;
use std::path::PathBuf;
use std::time::Duration;

/// Run configuration, injected at construction. All paths are explicit;
/// nothing resolves against the process working directory implicitly.
#[derive(Debug, Clone)]
pub struct MapperConfig {
    /// adb target: a `host:port` pair or a USB serial.
    pub device_address: String,
    /// Substring identifying the camera app in the foreground activity.
    pub camera_activity_hint: String,
    /// Scratch directory for checkpoints, recordings, and debug overlays.
    pub tmp_dir: PathBuf,
    /// Directory receiving the final brand/model artifact.
    pub output_dir: PathBuf,
    /// Screen-recording length per measured interaction.
    pub record_secs: u64,
    /// Extra wall-clock allowance before a recording counts as stuck.
    pub record_margin: Duration,
    /// Settle time after launching the camera app.
    pub camera_open_wait: Duration,
    /// Bounded retry budget for the open/check loop.
    pub max_open_attempts: u32,
    /// Resume point: 0 starts fresh, n > 0 reloads checkpoint n - 1.
    pub start_step: u32,
    pub requirements: MappingRequirements,
    /// Write annotated screenshots of detected regions into tmp_dir.
    pub debug_overlays: bool,
}

impl MapperConfig {
    pub fn new(device_address: impl Into<String>) -> Self {
        Self {
            device_address: device_address.into(),
            camera_activity_hint: "cam".into(),
            tmp_dir: std::env::temp_dir().join("camera_mapper"),
            output_dir: PathBuf::from("."),
            record_secs: 5,
            record_margin: Duration::from_secs(2),
            camera_open_wait: Duration::from_secs(2),
            max_open_attempts: 3,
            start_step: 0,
            requirements: MappingRequirements::default(),
            debug_overlays: false,
        }
    }
}

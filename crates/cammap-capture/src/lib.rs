//! Device transport for the camera mapper: the `Device` abstraction,
//! its ADB-backed implementation, screen recording orchestration, and
//! recorded-video decoding.

pub mod adb;
pub mod recording;
pub mod video;

use image::RgbaImage;
use serde::Serialize;

pub use adb::AdbDevice;
pub use recording::RecordingTask;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("device connection failed: {0}")]
    Connection(String),
    #[error("device command failed: {0}")]
    CommandFailed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("could not decode device output: {0}")]
    Decode(String),
    #[error("screen recording did not finish within {seconds}s")]
    RecordingTimeout { seconds: u64 },
}

/// Identity and geometry reported by a connected device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceProperties {
    pub brand: String,
    pub model: String,
    pub screen_width: u32,
    pub screen_height: u32,
}

impl DeviceProperties {
    /// Center of the screen, the default target for a bare viewfinder tap.
    pub fn center(&self) -> (i32, i32) {
        (
            (self.screen_width / 2) as i32,
            (self.screen_height / 2) as i32,
        )
    }
}

/// Frames pulled from a finished screen recording.
pub struct FrameSequence {
    pub frames: Vec<RgbaImage>,
    pub fps: f64,
}

impl FrameSequence {
    pub fn duration_secs(&self) -> f64 {
        if self.fps > 0.0 {
            self.frames.len() as f64 / self.fps
        } else {
            0.0
        }
    }
}

/// A connected Android device. All methods take `&self` so one handle
/// can drive taps from the control loop while a blocking recording task
/// holds a second clone; implementations use interior mutability.
pub trait Device: Send + Sync {
    fn connect(&self, address: &str) -> Result<DeviceProperties, DeviceError>;

    /// Package/activity of whatever currently owns the screen.
    fn foreground_activity(&self) -> Result<String, DeviceError>;
    fn open_camera_app(&self) -> Result<(), DeviceError>;
    fn close_camera_app(&self) -> Result<(), DeviceError>;

    fn capture_screenshot(&self) -> Result<RgbaImage, DeviceError>;
    /// UI hierarchy dump as XML text.
    fn capture_ui_tree(&self) -> Result<String, DeviceError>;
    fn tap(&self, x: i32, y: i32) -> Result<(), DeviceError>;

    /// Record the screen for `seconds`. Blocks for the full duration.
    fn record_screen(&self, seconds: u64) -> Result<(), DeviceError>;
    /// Pull the last recording into `workdir` and decode its frames.
    fn pull_recording(&self, workdir: &std::path::Path) -> Result<FrameSequence, DeviceError>;
    fn delete_remote_recording(&self) -> Result<(), DeviceError>;
}

use crate::{video, Device, DeviceError, DeviceProperties, FrameSequence};
use image::RgbaImage;
use std::path::Path;
use std::process::Command;
use std::sync::Mutex;
use tracing::{debug, info, warn};

const REMOTE_RECORDING_PATH: &str = "/sdcard/camera_mapper_recording.mp4";
const REMOTE_UI_DUMP_PATH: &str = "/sdcard/camera_mapper_window_dump.xml";

/// A device driven through the `adb` binary. A [`Mutex`] guards the
/// connection state so a shared handle satisfies the all-`&self`
/// [`Device`] contract.
pub struct AdbDevice {
    state: Mutex<ConnectionState>,
}

#[derive(Default)]
struct ConnectionState {
    serial: Option<String>,
    properties: Option<DeviceProperties>,
}

impl AdbDevice {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ConnectionState::default()),
        }
    }

    fn serial(&self) -> Option<String> {
        self.state.lock().ok()?.serial.clone()
    }

    /// Run an adb command against the connected device and capture stdout.
    fn adb(&self, args: &[&str]) -> Result<Vec<u8>, DeviceError> {
        let mut cmd = Command::new("adb");
        if let Some(serial) = self.serial() {
            cmd.arg("-s").arg(serial);
        }
        cmd.args(args);
        let output = cmd.output()?;
        if !output.status.success() {
            return Err(DeviceError::CommandFailed(format!(
                "adb {}: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }

    fn adb_text(&self, args: &[&str]) -> Result<String, DeviceError> {
        let stdout = self.adb(args)?;
        String::from_utf8(stdout)
            .map(|s| s.trim().to_string())
            .map_err(|e| DeviceError::Decode(e.to_string()))
    }

    fn getprop(&self, name: &str) -> Result<String, DeviceError> {
        self.adb_text(&["shell", "getprop", name])
    }
}

impl Default for AdbDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for AdbDevice {
    fn connect(&self, address: &str) -> Result<DeviceProperties, DeviceError> {
        // USB serials are used as-is; host:port targets need `adb connect`.
        if address.contains(':') {
            let output = Command::new("adb").arg("connect").arg(address).output()?;
            let text = String::from_utf8_lossy(&output.stdout);
            if !output.status.success() || text.contains("failed") || text.contains("cannot") {
                return Err(DeviceError::Connection(format!(
                    "{address}: {}",
                    text.trim()
                )));
            }
        }
        if let Ok(mut state) = self.state.lock() {
            state.serial = Some(address.to_string());
        }

        let brand = self.getprop("ro.product.brand")?;
        let model = self.getprop("ro.product.model")?;
        let size = self.adb_text(&["shell", "wm", "size"])?;
        let (screen_width, screen_height) = parse_screen_size(&size).ok_or_else(|| {
            DeviceError::Decode(format!("unexpected `wm size` output: {size}"))
        })?;

        let properties = DeviceProperties {
            brand: brand.to_lowercase().replace(char::is_whitespace, "_"),
            model: model.to_lowercase().replace(char::is_whitespace, "_"),
            screen_width,
            screen_height,
        };
        info!(
            "connected to {} {} ({}x{})",
            properties.brand, properties.model, screen_width, screen_height
        );
        if let Ok(mut state) = self.state.lock() {
            state.properties = Some(properties.clone());
        }
        Ok(properties)
    }

    fn foreground_activity(&self) -> Result<String, DeviceError> {
        let dump = self.adb_text(&["shell", "dumpsys", "activity", "activities"])?;
        parse_foreground_activity(&dump)
            .ok_or_else(|| DeviceError::Decode("no resumed activity in dumpsys output".into()))
    }

    fn open_camera_app(&self) -> Result<(), DeviceError> {
        debug!("launching default camera app");
        self.adb_text(&[
            "shell",
            "am",
            "start",
            "-a",
            "android.media.action.STILL_IMAGE_CAMERA",
        ])?;
        Ok(())
    }

    fn close_camera_app(&self) -> Result<(), DeviceError> {
        let activity = self.foreground_activity()?;
        let package = activity.split('/').next().unwrap_or(&activity).to_string();
        debug!("force-stopping {}", package);
        self.adb_text(&["shell", "am", "force-stop", &package])?;
        Ok(())
    }

    fn capture_screenshot(&self) -> Result<RgbaImage, DeviceError> {
        let png = self.adb(&["exec-out", "screencap", "-p"])?;
        let img = image::load_from_memory(&png)
            .map_err(|e| DeviceError::Decode(format!("screencap: {e}")))?;
        Ok(img.to_rgba8())
    }

    fn capture_ui_tree(&self) -> Result<String, DeviceError> {
        self.adb_text(&["shell", "uiautomator", "dump", REMOTE_UI_DUMP_PATH])?;
        let xml = self.adb_text(&["exec-out", "cat", REMOTE_UI_DUMP_PATH])?;
        let _ = self.adb_text(&["shell", "rm", "-f", REMOTE_UI_DUMP_PATH]);
        Ok(xml)
    }

    fn tap(&self, x: i32, y: i32) -> Result<(), DeviceError> {
        debug!("tap at ({}, {})", x, y);
        self.adb_text(&["shell", "input", "tap", &x.to_string(), &y.to_string()])?;
        Ok(())
    }

    fn record_screen(&self, seconds: u64) -> Result<(), DeviceError> {
        let limit = seconds.to_string();
        self.adb_text(&[
            "shell",
            "screenrecord",
            "--time-limit",
            &limit,
            REMOTE_RECORDING_PATH,
        ])?;
        Ok(())
    }

    fn pull_recording(&self, workdir: &Path) -> Result<FrameSequence, DeviceError> {
        std::fs::create_dir_all(workdir)?;
        let local = workdir.join("recording.mp4");
        let local_str = local.to_string_lossy().to_string();
        self.adb_text(&["pull", REMOTE_RECORDING_PATH, &local_str])?;
        video::decode_frames(&local)
    }

    fn delete_remote_recording(&self) -> Result<(), DeviceError> {
        if let Err(e) = self.adb_text(&["shell", "rm", "-f", REMOTE_RECORDING_PATH]) {
            warn!("could not delete remote recording: {}", e);
        }
        Ok(())
    }
}

/// Parse "Physical size: 1080x2400" (or the "Override size" line when
/// present, which reflects the active resolution).
fn parse_screen_size(raw: &str) -> Option<(u32, u32)> {
    let line = raw
        .lines()
        .find(|l| l.contains("Override size"))
        .or_else(|| raw.lines().find(|l| l.contains("Physical size")))?;
    let dims = line.split(':').nth(1)?.trim();
    let (w, h) = dims.split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

/// Pull `package/activity` out of a `dumpsys activity activities` dump.
fn parse_foreground_activity(dump: &str) -> Option<String> {
    let line = dump
        .lines()
        .find(|l| l.contains("topResumedActivity") || l.contains("mResumedActivity"))?;
    line.split_whitespace()
        .find(|token| token.contains('/'))
        .map(|token| token.trim_end_matches('}').to_string())
}

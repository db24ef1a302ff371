use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use camera_mapper::{Annotator, Explorer, MapperConfig, MapperError, SessionContext};
use cammap_capture::{Device, DeviceError, DeviceProperties, FrameSequence};
use cammap_data::{ActionKind, ClickableRegion, ItemKind, Point};
use image::RgbaImage;

const CAMERA_ACTIVITY: &str = "com.test.camera/.MainActivity";
const LAUNCHER_ACTIVITY: &str = "com.test.launcher/.Home";

const DEFAULT_UI_DUMP: &str = r#"<hierarchy rotation="0">
    <node text="" content-desc="Switch Camera" clickable="true" bounds="[0,0][100,100]"/>
    <node text="" content-desc="Shutter" clickable="true" bounds="[200,200][300,300]"/>
    <node text="Gallery" content-desc="" clickable="true" bounds="[400,400][500,500]"/>
</hierarchy>"#;

const OVERFLOW_UI_DUMP: &str = r#"<hierarchy rotation="0">
    <node text="" content-desc="Switch Camera" clickable="true" bounds="[0,0][100,100]"/>
    <node text="" content-desc="Shutter" clickable="true" bounds="[200,200][300,300]"/>
    <node text="" content-desc="More" clickable="true" bounds="[400,0][500,100]"/>
</hierarchy>"#;

/// A device that answers from a fixed script: connects, reports a
/// two-element camera screen, and optionally never foregrounds the app.
/// When a menu dump is scripted, taps toggle between the base screen and
/// that opened-menu screen.
struct ScriptedDevice {
    foregrounds: bool,
    ui_dump: String,
    menu_dump: Option<String>,
    menu_open: AtomicBool,
    open_calls: AtomicU32,
    close_calls: AtomicU32,
}

impl ScriptedDevice {
    fn new(foregrounds: bool) -> Self {
        Self {
            foregrounds,
            ui_dump: DEFAULT_UI_DUMP.into(),
            menu_dump: None,
            menu_open: AtomicBool::new(false),
            open_calls: AtomicU32::new(0),
            close_calls: AtomicU32::new(0),
        }
    }

    fn with_ui_dump(mut self, dump: &str) -> Self {
        self.ui_dump = dump.into();
        self
    }

    fn with_overflow_menu(mut self, menu_dump: &str) -> Self {
        self.ui_dump = OVERFLOW_UI_DUMP.into();
        self.menu_dump = Some(menu_dump.into());
        self
    }
}

impl Device for ScriptedDevice {
    fn connect(&self, _address: &str) -> Result<DeviceProperties, DeviceError> {
        Ok(DeviceProperties {
            brand: "testbrand".into(),
            model: "modelx".into(),
            screen_width: 640,
            screen_height: 480,
        })
    }

    fn foreground_activity(&self) -> Result<String, DeviceError> {
        if self.foregrounds && self.open_calls.load(Ordering::SeqCst) > 0 {
            Ok(CAMERA_ACTIVITY.into())
        } else {
            Ok(LAUNCHER_ACTIVITY.into())
        }
    }

    fn open_camera_app(&self) -> Result<(), DeviceError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close_camera_app(&self) -> Result<(), DeviceError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn capture_screenshot(&self) -> Result<RgbaImage, DeviceError> {
        // Featureless viewfinder: no contours, so all clickables come
        // from the accessibility tree.
        Ok(RgbaImage::from_pixel(64, 64, image::Rgba([20, 20, 20, 255])))
    }

    fn capture_ui_tree(&self) -> Result<String, DeviceError> {
        match &self.menu_dump {
            Some(menu) if self.menu_open.load(Ordering::SeqCst) => Ok(menu.clone()),
            _ => Ok(self.ui_dump.clone()),
        }
    }

    fn tap(&self, _x: i32, _y: i32) -> Result<(), DeviceError> {
        if self.menu_dump.is_some() {
            self.menu_open.fetch_xor(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn record_screen(&self, _seconds: u64) -> Result<(), DeviceError> {
        Ok(())
    }

    fn pull_recording(&self, _workdir: &Path) -> Result<FrameSequence, DeviceError> {
        Ok(FrameSequence {
            frames: Vec::new(),
            fps: 30.0,
        })
    }

    fn delete_remote_recording(&self) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// An operator that clicks nothing and accepts everything.
struct SilentAnnotator;

impl Annotator for SilentAnnotator {
    fn collect_clicks(&self, _image: &RgbaImage) -> anyhow::Result<Vec<Point>> {
        Ok(Vec::new())
    }
    fn confirm_labels(
        &self,
        _image: &RgbaImage,
        _regions: &[ClickableRegion],
    ) -> anyhow::Result<bool> {
        Ok(true)
    }
    fn choose_item_kind(&self, candidates: &[ItemKind]) -> anyhow::Result<ItemKind> {
        Ok(candidates[0])
    }
    fn choose_action_kind(&self, candidates: &[ActionKind]) -> anyhow::Result<ActionKind> {
        Ok(candidates[0])
    }
    fn prompt_free_text(&self, _prompt: &str) -> anyhow::Result<String> {
        Ok(String::new())
    }
}

fn test_config(name: &str) -> MapperConfig {
    let base = std::env::temp_dir().join(format!("camera_mapper_it_{name}"));
    let mut config = MapperConfig::new("127.0.0.1:5555");
    config.camera_activity_hint = "camera".into();
    config.tmp_dir = base.join("tmp");
    config.output_dir = base.join("out");
    config.camera_open_wait = Duration::from_millis(0);
    config.record_margin = Duration::from_millis(200);
    config
}

fn artifact_path(config: &MapperConfig) -> PathBuf {
    config.output_dir.join("testbrand_modelx_mapping.json")
}

#[tokio::test]
async fn happy_path_maps_the_two_basic_commands() {
    let config = test_config("happy");
    let cleanup = config.output_dir.parent().unwrap().to_path_buf();
    let artifact = artifact_path(&config);

    let device = Arc::new(ScriptedDevice::new(true));
    let session =
        SessionContext::new(config, device.clone(), Arc::new(SilentAnnotator), None).unwrap();

    let catalogue = Explorer::new(session).run().await.unwrap();

    assert_eq!(catalogue.commands.len(), 2);
    let names: Vec<&str> = catalogue.commands.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["switch_camera", "shutter"]);
    for command in &catalogue.commands {
        assert_eq!(command.requirements.cam, "main");
        assert_eq!(command.requirements.mode, "photo");
    }

    // Touch change sequence recorded for all screens, with its fixed sleep.
    let touch = catalogue.sequence(ItemKind::Touch).unwrap();
    assert_eq!(touch.sequence_on, vec![ActionKind::ClickAction]);
    assert_eq!(touch.sleep_for(ActionKind::ClickAction), Some(2.0));

    // Final artifact written with the fixed on-disk schema; the run
    // closes the app at least once.
    let json = std::fs::read_to_string(&artifact).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(doc["COMMANDS"].as_array().unwrap().len(), 2);
    assert_eq!(doc["COMMANDS"][0]["command_name"], "switch_camera");
    assert!(doc["COMMAND_CHANGE_SEQUENCE"]["TOUCH"]["COMMAND_SLEEPS"]["CLICK_ACTION"].is_number());
    assert!(device.close_calls.load(Ordering::SeqCst) >= 1);

    let _ = std::fs::remove_dir_all(cleanup);
}

#[tokio::test]
async fn launch_failure_errors_after_three_open_attempts() {
    let config = test_config("launch_failure");
    let cleanup = config.output_dir.parent().unwrap().to_path_buf();

    let device = Arc::new(ScriptedDevice::new(false));
    let session =
        SessionContext::new(config, device.clone(), Arc::new(SilentAnnotator), None).unwrap();

    let err = Explorer::new(session).run().await.unwrap_err();
    assert!(matches!(err, MapperError::CameraAppLaunch { attempts: 3 }));
    assert_eq!(device.open_calls.load(Ordering::SeqCst), 3);
    // Best-effort close on the error path.
    assert!(device.close_calls.load(Ordering::SeqCst) >= 1);

    let _ = std::fs::remove_dir_all(cleanup);
}

#[tokio::test]
async fn final_save_failure_still_closes_the_camera_app() {
    let config = test_config("final_save_failure");
    let cleanup = config.output_dir.parent().unwrap().to_path_buf();

    // A regular file where the output directory should go makes the
    // final artifact save fail after every mapping step succeeded.
    std::fs::create_dir_all(&cleanup).unwrap();
    std::fs::write(&config.output_dir, b"not a directory").unwrap();

    let device = Arc::new(ScriptedDevice::new(true));
    let session =
        SessionContext::new(config, device.clone(), Arc::new(SilentAnnotator), None).unwrap();

    let err = Explorer::new(session).run().await.unwrap_err();
    assert!(matches!(err, MapperError::Persistence(_)));
    assert!(device.close_calls.load(Ordering::SeqCst) >= 1);

    let _ = std::fs::remove_dir_all(cleanup);
}

#[tokio::test]
async fn malformed_ui_dump_aborts_with_a_parse_error() {
    let config = test_config("malformed_dump");
    let cleanup = config.output_dir.parent().unwrap().to_path_buf();

    let device =
        Arc::new(ScriptedDevice::new(true).with_ui_dump("<hierarchy><node bounds=\"broken\""));
    let session =
        SessionContext::new(config, device.clone(), Arc::new(SilentAnnotator), None).unwrap();

    let err = Explorer::new(session).run().await.unwrap_err();
    assert!(matches!(err, MapperError::Parse(_)));
    assert!(device.close_calls.load(Ordering::SeqCst) >= 1);

    let _ = std::fs::remove_dir_all(cleanup);
}

#[tokio::test]
async fn screen_without_clickables_aborts_the_run() {
    let config = test_config("empty_screen");
    let cleanup = config.output_dir.parent().unwrap().to_path_buf();

    // Valid dump, zero clickable nodes; the featureless screenshot adds
    // no visual detections either.
    let device =
        Arc::new(ScriptedDevice::new(true).with_ui_dump(r#"<hierarchy rotation="0"/>"#));
    let session =
        SessionContext::new(config, device.clone(), Arc::new(SilentAnnotator), None).unwrap();

    let err = Explorer::new(session).run().await.unwrap_err();
    assert!(matches!(err, MapperError::EmptyScreen));
    assert!(device.close_calls.load(Ordering::SeqCst) >= 1);

    let _ = std::fs::remove_dir_all(cleanup);
}

#[tokio::test]
async fn unfruitful_overflow_menu_is_closed_again() {
    let config = test_config("overflow_close");
    let cleanup = config.output_dir.parent().unwrap().to_path_buf();

    // The overflow menu opens but holds none of the searched features,
    // so every excursion must end back on the base screen.
    let device = Arc::new(ScriptedDevice::new(true).with_overflow_menu(
        r#"<hierarchy rotation="0">
            <node text="" content-desc="Beauty" clickable="true" bounds="[100,100][200,200]"/>
        </hierarchy>"#,
    ));
    let session =
        SessionContext::new(config, device.clone(), Arc::new(SilentAnnotator), None).unwrap();

    let catalogue = Explorer::new(session).run().await.unwrap();
    assert_eq!(catalogue.commands.len(), 2);
    assert!(!device.menu_open.load(Ordering::SeqCst));

    let _ = std::fs::remove_dir_all(cleanup);
}

#[tokio::test]
async fn resume_skips_completed_mapping_steps() {
    let mut config = test_config("resume");
    let cleanup = config.output_dir.parent().unwrap().to_path_buf();

    // Seed a step-0 checkpoint as a previous run would have left it.
    std::fs::create_dir_all(&config.tmp_dir).unwrap();
    let mut seeded = cammap_data::CommandCatalogue::default();
    seeded.push_command(cammap_data::Command::new(
        "switch_camera",
        Point::new(50, 50),
        cammap_data::Requirement::single("main", "photo"),
    ));
    seeded
        .save(&config.tmp_dir.join("res_step_0.json"))
        .unwrap();
    config.start_step = 1;

    let device = Arc::new(ScriptedDevice::new(true));
    let session =
        SessionContext::new(config, device, Arc::new(SilentAnnotator), None).unwrap();
    let catalogue = Explorer::new(session).run().await.unwrap();

    // Basic mapping was skipped: only the seeded command survives, not a
    // re-detected duplicate pair.
    assert_eq!(catalogue.commands.len(), 1);
    assert_eq!(catalogue.commands[0].name, "switch_camera");

    let _ = std::fs::remove_dir_all(cleanup);
}

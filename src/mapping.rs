use std::time::Duration;

use cammap_capture::{recording, Device, FrameSequence};
use cammap_data::requirements::{normalize_name, CAPTURE_NAMES, OVERFLOW_MENU_NAMES, SWITCH_CAM_NAMES};
use cammap_data::{
    ActionKind, BoundingBox, ClickableRegion, Command, ItemKind, Point,
};
use cammap_vision::{contours, timing, AnimationInterval, ContourConfig, TextRecognizer};
use tracing::{info, warn};

use crate::annotate::Annotator;
use crate::error::MapperError;
use crate::session::SessionContext;

/// Fixed sleep recorded for a bare viewfinder touch.
const TOUCH_SLEEP_SECS: f64 = 2.0;
/// Safety factor for nested menu actions, inflated more aggressively
/// than the menu-open sleep.
const ACTION_SLEEP_FACTOR: f64 = 1.5;
/// Fallback sleep when the recording yielded no measurable animation.
const DEFAULT_MENU_SLEEP_SECS: f64 = 1.0;
/// Settle time between starting the recording and issuing the tap.
const TAP_SETTLE: Duration = Duration::from_secs(1);

/// Locate and record the two controls every camera screen must have:
/// the camera switch and the shutter. Missing either is fatal.
pub fn mark_basic(session: &mut SessionContext) -> Result<(), MapperError> {
    let switch = find_in_tree(session, SWITCH_CAM_NAMES)
        .ok_or_else(|| MapperError::RegionNotFound("switch_camera".into()))?;
    let shutter = find_in_tree(session, CAPTURE_NAMES)
        .ok_or_else(|| MapperError::RegionNotFound("shutter".into()))?;

    let base = session.config.requirements.base_requirement();
    for (name, bounds) in [switch, shutter] {
        session
            .catalogue
            .push_command(Command::new(name, bounds.centroid(), base.clone()));
    }
    Ok(())
}

/// Record the touch-to-focus change sequence for the whole cam x mode
/// cross product. The tap target is the screen center derived from
/// device properties at playback, so no coordinate command is appended.
pub fn map_touch(session: &mut SessionContext) {
    let seq = session.catalogue.sequence_mut(ItemKind::Touch);
    seq.sequence_on = vec![ActionKind::ClickAction];
    seq.sequence_off = vec![ActionKind::ClickAction];
    seq.join_sleep_with(ActionKind::ClickAction, TOUCH_SLEEP_SECS, 1.0);
    if let Ok(props) = session.properties() {
        let (cx, cy) = props.center();
        info!("touch sequence recorded for all screens, playback target ({cx}, {cy})");
    }
}

/// Operator-driven labeling of the purely-visual detections the
/// accessibility tree missed (zoom-level buttons and the like). Zero
/// collected clicks means nothing to label.
pub fn label_visual_elements(session: &mut SessionContext) -> Result<(), MapperError> {
    let (screenshot, candidates) = {
        let screen = session.screen()?;
        if screen.visual_only.is_empty() {
            return Ok(());
        }
        (
            screen.screenshot.clone(),
            screen.visual_only.values().copied().collect::<Vec<_>>(),
        )
    };
    let annotator = session.annotator.clone();

    let clicks = annotator.collect_clicks(&screenshot)?;
    if clicks.is_empty() {
        return Ok(());
    }

    let items = session.config.requirements.items.clone();
    let base = session.config.requirements.base_requirement();
    let mut labeled = Vec::new();
    for click in clicks {
        let bounds =
            nearest_box(&candidates, click).unwrap_or_else(|| BoundingBox::new(click, click));
        let kind = annotator.choose_item_kind(&items)?;
        let label = normalize_name(&annotator.prompt_free_text("element label")?);
        if label.is_empty() {
            continue;
        }
        let name = format!("{} {}", kind.label(), label);
        labeled.push((name, bounds));
    }

    let regions: Vec<ClickableRegion> = labeled
        .iter()
        .map(|(name, bounds)| ClickableRegion::from_ocr(name.clone(), *bounds))
        .collect();
    if !annotator.confirm_labels(&screenshot, &regions)? {
        warn!("operator rejected visual-element labels, none recorded");
        return Ok(());
    }

    for (name, bounds) in labeled {
        session
            .catalogue
            .push_command(Command::new(name, bounds.centroid(), base.clone()));
    }
    Ok(())
}

/// Map one menu-backed feature: locate its control (directly, via OCR,
/// or behind the overflow menu), measure its open animation, record the
/// change sequence and sleeps, and label the opened menu's options.
///
/// A feature that cannot be located is left unmapped with a warning;
/// playback consumers handle its absence.
pub async fn map_menu_feature(
    session: &mut SessionContext,
    item: ItemKind,
    patterns: &[&str],
) -> Result<(), MapperError> {
    let mut found = locate_feature(session, patterns);

    if found.is_none() {
        if let Some((menu_name, menu_bounds)) = find_in_tree(session, OVERFLOW_MENU_NAMES) {
            info!(
                "{} not visible, trying overflow menu '{}'",
                item.label(),
                menu_name
            );
            let center = menu_bounds.centroid();
            session.device.tap(center.x, center.y)?;
            tokio::time::sleep(session.config.camera_open_wait).await;
            session.capture_and_process()?;
            found = locate_feature(session, patterns);
            if found.is_none() {
                // Close the overflow menu again so the next mapping
                // state scans the base screen.
                session.device.tap(center.x, center.y)?;
                tokio::time::sleep(session.config.camera_open_wait).await;
                session.capture_and_process()?;
            }
        }
    }

    let Some((name, bounds)) = found else {
        warn!("{} control not found, leaving it unmapped", item.label());
        return Ok(());
    };
    info!("{} control located: '{}'", item.label(), name);

    let target = bounds.centroid();
    let (frames, intervals) = record_tap_animation(session, target).await?;

    let open = intervals.first().copied();
    let seq = session.catalogue.sequence_mut(item);
    seq.sequence_on = vec![ActionKind::ClickMenu, ActionKind::ClickAction];
    seq.sequence_off = vec![ActionKind::ClickMenu, ActionKind::ClickAction];
    match open {
        Some(interval) => {
            seq.join_sleep(ActionKind::ClickMenu, interval.duration_secs);
            seq.join_sleep_with(
                ActionKind::ClickAction,
                interval.duration_secs,
                ACTION_SLEEP_FACTOR,
            );
        }
        None => {
            warn!(
                "no animation measured for {}, using default sleep",
                item.label()
            );
            seq.join_sleep_with(ActionKind::ClickMenu, DEFAULT_MENU_SLEEP_SECS, 1.0);
            seq.join_sleep_with(ActionKind::ClickAction, DEFAULT_MENU_SLEEP_SECS, 1.0);
        }
    }

    let all = session.config.requirements.all_requirement();
    session.catalogue.push_command(Command::new(
        format!("{} menu", item.label()),
        target,
        all,
    ));

    if let Some(interval) = open {
        label_opened_menu(session, item, &frames, interval)?;
    }

    // Close the menu again and restore the base screen.
    session.device.tap(target.x, target.y)?;
    tokio::time::sleep(session.config.camera_open_wait).await;
    session.capture_and_process()?;
    Ok(())
}

/// Pattern search over the current screen's tree names, then over OCR
/// words when a recognizer is available.
fn locate_feature(session: &SessionContext, patterns: &[&str]) -> Option<(String, BoundingBox)> {
    if let Some(found) = find_in_tree(session, patterns) {
        return Some(found);
    }
    let recognizer = session.recognizer.as_ref().filter(|r| r.is_available())?;
    let screen = session.screen.as_ref()?;
    let words = recognizer.recognize(&screen.screenshot);
    for pattern in patterns {
        let needle = normalize_name(pattern);
        if let Some(word) = words
            .iter()
            .find(|w| w.label.as_deref().is_some_and(|l| l.contains(&needle)))
        {
            return Some((
                word.label.clone().unwrap_or_default(),
                word.bounds,
            ));
        }
    }
    None
}

fn find_in_tree(session: &SessionContext, patterns: &[&str]) -> Option<(String, BoundingBox)> {
    let screen = session.screen.as_ref()?;
    screen
        .tree
        .find_any(patterns)
        .map(|(name, bounds)| (name.to_string(), bounds))
}

/// The recording interaction protocol: start a fixed-duration screen
/// recording on the blocking pool, settle, tap, rendezvous with a
/// timeout, pull and decode the frames, delete the remote file, and
/// measure the animation intervals.
async fn record_tap_animation(
    session: &mut SessionContext,
    target: Point,
) -> Result<(FrameSequence, Vec<AnimationInterval>), MapperError> {
    let device = session.device.clone();
    let task = recording::start(device.clone(), session.config.record_secs);
    tokio::time::sleep(TAP_SETTLE).await;
    device.tap(target.x, target.y)?;
    task.finish(session.config.record_margin).await?;

    let workdir = session
        .config
        .tmp_dir
        .join(format!("recording_step_{}", session.step));
    let frames = device.pull_recording(&workdir)?;
    device.delete_remote_recording()?;

    let intervals = timing::analyze(&frames.frames, frames.fps);
    info!(
        "recording: {} frames at {:.1} fps, {} animation interval(s)",
        frames.frames.len(),
        frames.fps,
        intervals.len()
    );
    Ok((frames, intervals))
}

/// Label the options of an opened menu from a stable recorded frame.
/// Operator clicks snap to the nearest detected region.
fn label_opened_menu(
    session: &mut SessionContext,
    item: ItemKind,
    frames: &FrameSequence,
    open: AnimationInterval,
) -> Result<(), MapperError> {
    let index = timing::opened_frame_index(frames.frames.len(), open.end_frame);
    let Some(frame) = frames.frames.get(index) else {
        return Ok(());
    };

    let detected = contours::detect(frame, &ContourConfig::default());
    let candidates: Vec<BoundingBox> = detected.iter().map(|r| r.bounds).collect();
    let annotator = session.annotator.clone();

    let clicks = annotator.collect_clicks(frame)?;
    if clicks.is_empty() {
        return Ok(());
    }

    let actions = session.config.requirements.actions.clone();
    let all = session.config.requirements.all_requirement();
    for click in clicks {
        let bounds =
            nearest_box(&candidates, click).unwrap_or_else(|| BoundingBox::new(click, click));
        let label = normalize_name(&annotator.prompt_free_text("menu option label")?);
        if label.is_empty() {
            continue;
        }
        let action = annotator.choose_action_kind(&actions)?;
        let name = match action {
            ActionKind::ClickMenu => format!("{} {} menu", item.label(), label),
            ActionKind::ClickAction => format!("{} {}", item.label(), label),
        };
        session
            .catalogue
            .push_command(Command::new(name, bounds.centroid(), all.clone()));
    }
    Ok(())
}

/// The candidate box whose centroid is closest to the click.
fn nearest_box(candidates: &[BoundingBox], click: Point) -> Option<BoundingBox> {
    candidates
        .iter()
        .min_by(|a, b| {
            let da = a.centroid().distance_to(click);
            let db = b.centroid().distance_to(click);
            da.total_cmp(&db)
        })
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cammap_data::Point;

    fn bbox(x1: i32, y1: i32, x2: i32, y2: i32) -> BoundingBox {
        BoundingBox::new(Point::new(x1, y1), Point::new(x2, y2))
    }

    #[test]
    fn test_nearest_box_snaps_to_closest_centroid() {
        let candidates = vec![bbox(0, 0, 10, 10), bbox(100, 100, 120, 120)];
        let near = nearest_box(&candidates, Point::new(8, 8)).unwrap();
        assert_eq!(near, candidates[0]);
        let far = nearest_box(&candidates, Point::new(115, 90)).unwrap();
        assert_eq!(far, candidates[1]);
        assert!(nearest_box(&[], Point::new(0, 0)).is_none());
    }
}

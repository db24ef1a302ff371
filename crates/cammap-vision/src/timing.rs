use image::RgbaImage;
use serde::Serialize;
use tracing::debug;

/// Moving-average window over the frame-difference series.
pub const SMOOTHING_WINDOW: usize = 4;
/// Consecutive samples past the threshold required to flip state.
pub const DEBOUNCE_SAMPLES: usize = 3;
/// Bursts shorter than this are noise blips, not animations.
pub const MIN_ANIMATION_SECS: f64 = 0.3;

/// One detected animation burst: a contiguous run of visual change
/// bounded by static frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnimationInterval {
    pub start_frame: usize,
    pub end_frame: usize,
    pub duration_secs: f64,
}

/// Detect animation bursts in a recorded frame sequence.
///
/// Menu open/close and mode-switch transitions manifest as a burst of
/// inter-frame change bounded by static before/after states; this is a
/// change-point detector tuned for that bimodal signature, not a frame
/// classifier. Pipeline: pairwise MSE, moving-average smoothing,
/// mean-thresholded hysteresis, interval extraction.
pub fn analyze(frames: &[RgbaImage], fps: f64) -> Vec<AnimationInterval> {
    let diffs = frame_differences(frames);
    analyze_series(&diffs, fps)
}

/// The same pipeline over a precomputed difference series.
pub fn analyze_series(diffs: &[f64], fps: f64) -> Vec<AnimationInterval> {
    if diffs.is_empty() || fps <= 0.0 {
        return Vec::new();
    }
    let smoothed = moving_average(diffs, SMOOTHING_WINDOW);
    let states = state_buffer(&smoothed, DEBOUNCE_SAMPLES);
    let intervals = extract_intervals(&states, fps, MIN_ANIMATION_SECS);
    debug!(
        "timing: {} samples -> {} animation interval(s)",
        diffs.len(),
        intervals.len()
    );
    intervals
}

/// Mean squared error between consecutive frames, over the RGB channels.
pub fn frame_differences(frames: &[RgbaImage]) -> Vec<f64> {
    frames
        .windows(2)
        .map(|pair| mse(&pair[0], &pair[1]))
        .collect()
}

fn mse(a: &RgbaImage, b: &RgbaImage) -> f64 {
    if a.dimensions() != b.dimensions() {
        // Mismatched frames read as maximal change.
        return 255.0 * 255.0;
    }
    let mut sum = 0.0f64;
    let mut count = 0u64;
    for (pa, pb) in a.pixels().zip(b.pixels()) {
        for c in 0..3 {
            let d = pa[c] as f64 - pb[c] as f64;
            sum += d * d;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Moving average with the tail padded by repeating the last computed
/// window average, so the output length equals the input length.
pub fn moving_average(series: &[f64], window: usize) -> Vec<f64> {
    if series.is_empty() {
        return Vec::new();
    }
    let window = window.max(1);
    if series.len() <= window {
        let avg = series.iter().sum::<f64>() / series.len() as f64;
        return vec![avg; series.len()];
    }

    let mut averaged = Vec::with_capacity(series.len());
    let mut last = 0.0;
    for chunk in series.windows(window) {
        last = chunk.iter().sum::<f64>() / window as f64;
        averaged.push(last);
    }
    while averaged.len() < series.len() {
        averaged.push(last);
    }
    averaged
}

/// Classify each sample as transitioning (true) or static (false) using
/// the series mean as a dynamic threshold, with debounced hysteresis:
/// the state flips only after `debounce` consecutive samples on the
/// other side, which suppresses chatter right at the threshold.
pub fn state_buffer(series: &[f64], debounce: usize) -> Vec<bool> {
    if series.is_empty() {
        return Vec::new();
    }
    let threshold = series.iter().sum::<f64>() / series.len() as f64;

    let mut high = false;
    let mut streak = 0usize;
    let mut states = Vec::with_capacity(series.len());
    for &sample in series {
        let crossing = if high {
            sample < threshold
        } else {
            sample > threshold
        };
        if crossing {
            streak += 1;
        } else {
            streak = 0;
        }
        if streak >= debounce {
            high = !high;
            streak = 0;
        }
        states.push(high);
    }
    states
}

/// Extract `(start, end, duration)` for each LOW→HIGH→LOW cycle longer
/// than `min_secs`. A HIGH run still open when the sequence ends is not
/// emitted.
pub fn extract_intervals(states: &[bool], fps: f64, min_secs: f64) -> Vec<AnimationInterval> {
    let mut intervals = Vec::new();
    let mut start: Option<usize> = None;
    let mut prev = false;

    for (i, &state) in states.iter().enumerate() {
        match (prev, state) {
            (false, true) => start = Some(i),
            (true, false) => {
                if let Some(s) = start.take() {
                    let duration_secs = (i - s) as f64 / fps;
                    if duration_secs > min_secs {
                        intervals.push(AnimationInterval {
                            start_frame: s,
                            end_frame: i,
                            duration_secs,
                        });
                    }
                }
            }
            _ => {}
        }
        prev = state;
    }
    intervals
}

/// Frame index to sample for a stable view of an opened menu: midway
/// between the end of the open animation and the end of the recording,
/// clamped to a few frames past the animation so the menu has not yet
/// auto-dismissed.
pub fn opened_frame_index(frame_count: usize, open_end_frame: usize) -> usize {
    if frame_count == 0 {
        return 0;
    }
    let last = frame_count - 1;
    let end = open_end_frame.min(last);
    let midway = end + (last - end) / 2;
    midway.min(end + 5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// A series with a rectangular pulse of `high` over a `low` floor.
    fn pulse_series(len: usize, pulse: std::ops::Range<usize>, low: f64, high: f64) -> Vec<f64> {
        (0..len)
            .map(|i| if pulse.contains(&i) { high } else { low })
            .collect()
    }

    #[test]
    fn test_flat_series_yields_no_intervals() {
        let flat = vec![10.0; 120];
        assert!(analyze_series(&flat, 30.0).is_empty());
        let zero = vec![0.0; 120];
        assert!(analyze_series(&zero, 30.0).is_empty());
    }

    #[test]
    fn test_clean_pulse_yields_one_interval_near_its_duration() {
        // 1-second pulse (frames 30..60) at 30fps in a 4-second series.
        let series = pulse_series(120, 30..60, 1.0, 400.0);
        let intervals = analyze_series(&series, 30.0);
        assert_eq!(intervals.len(), 1);
        let iv = intervals[0];
        // Debounce shifts both edges by up to the debounce length plus
        // the smoothing window.
        let slack = (DEBOUNCE_SAMPLES + SMOOTHING_WINDOW) as f64 / 30.0;
        assert!((iv.duration_secs - 1.0).abs() <= slack, "got {iv:?}");
    }

    #[test]
    fn test_durations_positive_and_within_span() {
        let series = pulse_series(200, 50..100, 2.0, 900.0);
        let fps = 25.0;
        for iv in analyze_series(&series, fps) {
            assert!(iv.duration_secs > 0.0);
            assert!(iv.duration_secs <= series.len() as f64 / fps);
            assert!(iv.start_frame < iv.end_frame);
        }
    }

    #[test]
    fn test_trailing_high_run_is_not_emitted() {
        // Change keeps running until the end of the recording.
        let series = pulse_series(100, 60..100, 1.0, 500.0);
        assert!(analyze_series(&series, 30.0).is_empty());
    }

    #[test]
    fn test_short_blip_rejected() {
        // 3-frame blip at 30fps is 0.1s, below the minimum.
        let series = pulse_series(120, 50..53, 1.0, 500.0);
        let smoothed = moving_average(&series, SMOOTHING_WINDOW);
        let states = state_buffer(&smoothed, 1);
        assert!(extract_intervals(&states, 30.0, MIN_ANIMATION_SECS).is_empty());
    }

    #[test]
    fn test_moving_average_preserves_length() {
        let series: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let avg = moving_average(&series, 4);
        assert_eq!(avg.len(), series.len());
        // Tail is padded with the last computed average.
        assert_eq!(avg[avg.len() - 1], avg[avg.len() - 4]);

        let short = vec![3.0, 5.0];
        assert_eq!(moving_average(&short, 4), vec![4.0, 4.0]);
    }

    #[test]
    fn test_state_buffer_debounces_chatter() {
        // Alternating samples around the mean never flip the state with
        // a debounce of 3.
        let series: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 0.0 } else { 10.0 }).collect();
        let states = state_buffer(&series, 3);
        assert!(states.iter().all(|&s| !s));
    }

    #[test]
    fn test_frame_differences_on_synthetic_frames() {
        let dark = RgbaImage::from_pixel(8, 8, Rgba([10, 10, 10, 255]));
        let bright = RgbaImage::from_pixel(8, 8, Rgba([200, 200, 200, 255]));
        let diffs = frame_differences(&[dark.clone(), dark.clone(), bright, dark]);
        assert_eq!(diffs.len(), 3);
        assert_eq!(diffs[0], 0.0);
        assert!(diffs[1] > 0.0);
        assert_eq!(diffs[1], diffs[2]);
    }

    #[test]
    fn test_opened_frame_index_clamps_near_animation_end() {
        // Long recording: clamp to five frames past the open animation.
        assert_eq!(opened_frame_index(150, 30), 35);
        // Short remainder: midway point.
        assert_eq!(opened_frame_index(40, 30), 34);
        assert_eq!(opened_frame_index(0, 10), 0);
    }
}

use crate::{DeviceError, FrameSequence};
#[cfg(feature = "video")]
use image::RgbaImage;
use std::path::Path;

/// Decode every frame of a recorded video into RGBA images.
///
/// With the `video` feature, decoding happens in-process via ffmpeg-next.
/// Without it, the `ffmpeg`/`ffprobe` binaries are shelled out to, which
/// keeps the default build free of native codec linkage.
pub fn decode_frames(path: &Path) -> Result<FrameSequence, DeviceError> {
    #[cfg(feature = "video")]
    {
        decode_with_ffmpeg_next(path)
    }
    #[cfg(not(feature = "video"))]
    {
        decode_with_ffmpeg_cli(path)
    }
}

#[cfg(feature = "video")]
fn decode_with_ffmpeg_next(path: &Path) -> Result<FrameSequence, DeviceError> {
    use tracing::info;

    let decode = || -> anyhow::Result<FrameSequence> {
        ffmpeg_next::init()?;

        let mut ictx = ffmpeg_next::format::input(path)?;
        let video_stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("no video stream found"))?;

        let stream_index = video_stream.index();
        let rate = video_stream.avg_frame_rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            30.0
        };

        let decoder_ctx =
            ffmpeg_next::codec::context::Context::from_parameters(video_stream.parameters())?;
        let mut decoder = decoder_ctx.decoder().video()?;

        let mut scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg_next::format::Pixel::RGBA,
            decoder.width(),
            decoder.height(),
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        info!(
            "recording opened: {}x{}, format {:?}, {:.1} fps",
            decoder.width(),
            decoder.height(),
            decoder.format(),
            fps
        );

        let width = decoder.width();
        let height = decoder.height();
        let mut frames = Vec::new();

        let mut drain =
            |decoder: &mut ffmpeg_next::decoder::Video, frames: &mut Vec<RgbaImage>| -> anyhow::Result<()> {
                let mut decoded_frame = ffmpeg_next::frame::Video::empty();
                while decoder.receive_frame(&mut decoded_frame).is_ok() {
                    let mut rgba_frame = ffmpeg_next::frame::Video::empty();
                    scaler.run(&decoded_frame, &mut rgba_frame)?;

                    let data = rgba_frame.data(0);
                    let stride = rgba_frame.stride(0);

                    // Copy row-by-row in case stride != width*4
                    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
                    for y in 0..height as usize {
                        let row_start = y * stride;
                        let row_end = row_start + (width as usize * 4);
                        pixels.extend_from_slice(&data[row_start..row_end]);
                    }

                    if let Some(img) = RgbaImage::from_raw(width, height, pixels) {
                        frames.push(img);
                    }
                }
                Ok(())
            };

        for (stream, packet) in ictx.packets() {
            if stream.index() != stream_index {
                continue;
            }
            decoder.send_packet(&packet)?;
            drain(&mut decoder, &mut frames)?;
        }
        decoder.send_eof()?;
        drain(&mut decoder, &mut frames)?;

        Ok(FrameSequence { frames, fps })
    };

    decode().map_err(|e| DeviceError::Decode(format!("{}: {e}", path.display())))
}

#[cfg(not(feature = "video"))]
fn decode_with_ffmpeg_cli(path: &Path) -> Result<FrameSequence, DeviceError> {
    use std::process::Command;
    use tracing::debug;

    let fps = probe_fps(path).unwrap_or(30.0);

    let frame_dir = path
        .parent()
        .unwrap_or(Path::new("."))
        .join("decoded_frames");
    std::fs::create_dir_all(&frame_dir)?;
    let pattern = frame_dir.join("frame_%05d.png");

    let output = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(path)
        .arg(&pattern)
        .output()?;
    if !output.status.success() {
        return Err(DeviceError::Decode(format!(
            "ffmpeg failed on {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let mut entries: Vec<_> = std::fs::read_dir(&frame_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
        .collect();
    entries.sort();

    let mut frames = Vec::with_capacity(entries.len());
    for entry in &entries {
        let img = image::open(entry)
            .map_err(|e| DeviceError::Decode(format!("{}: {e}", entry.display())))?;
        frames.push(img.to_rgba8());
    }
    let _ = std::fs::remove_dir_all(&frame_dir);

    debug!("decoded {} frame(s) at {:.1} fps", frames.len(), fps);
    Ok(FrameSequence { frames, fps })
}

/// Average frame rate via ffprobe, e.g. "30000/1001".
#[cfg(not(feature = "video"))]
fn probe_fps(path: &Path) -> Option<f64> {
    use std::process::Command;

    let output = Command::new("ffprobe")
        .arg("-v")
        .arg("error")
        .arg("-select_streams")
        .arg("v:0")
        .arg("-show_entries")
        .arg("stream=avg_frame_rate")
        .arg("-of")
        .arg("csv=p=0")
        .arg(path)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    parse_frame_rate(text.trim())
}

#[cfg(not(feature = "video"))]
fn parse_frame_rate(raw: &str) -> Option<f64> {
    let (num, den) = raw.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den == 0.0 {
        return None;
    }
    Some(num / den)
}

#[cfg(all(test, not(feature = "video")))]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("30000/1001").map(|f| f.round()), Some(30.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("garbage"), None);
    }
}

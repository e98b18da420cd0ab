//! Image normalization and video frame sampling.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use assess_flow::{FlowError, Result, SampledFrame, insights::frame_indices};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, codecs::jpeg::JpegEncoder};
use serde::Deserialize;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// JPEG quality used for sampled video frames.
pub const FRAME_JPEG_QUALITY: u8 = 85;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Decode any supported image, flatten it to RGB and re-encode it as base64 JPEG.
pub fn normalize_image(bytes: &[u8]) -> Result<String> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| FlowError::Media(format!("Could not decode image: {}", e)))?;
    let jpeg = encode_jpeg(&image, None)?;
    Ok(STANDARD.encode(jpeg))
}

fn encode_jpeg(image: &DynamicImage, quality: Option<u8>) -> Result<Vec<u8>> {
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut buffer = Vec::new();

    let written = match quality {
        Some(quality) => {
            let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
            rgb.write_with_encoder(encoder)
        }
        None => rgb.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg),
    };
    written.map_err(|e| FlowError::Media(format!("Failed to encode image: {}", e)))?;

    Ok(buffer)
}

/// Samples still frames from an uploaded video.
#[async_trait]
pub trait FrameSampler: Send + Sync {
    async fn sample(&self, video: &[u8], count: usize) -> Result<Vec<SampledFrame>>;
}

/// Frame sampler backed by the `ffprobe` and `ffmpeg` binaries.
///
/// The upload is staged in a scratch file that is removed on every return path.
#[derive(Debug, Clone, Default)]
pub struct FfmpegFrameSampler {
    scratch_dir: Option<PathBuf>,
}

impl FfmpegFrameSampler {
    /// Stage uploads under `dir` instead of the system temp directory.
    pub fn with_scratch_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: Some(dir.into()),
        }
    }

    fn scratch_file(&self) -> Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.suffix(".mp4");
        match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| FlowError::Media(format!("Failed to create temp file: {}", e)))
    }
}

#[async_trait]
impl FrameSampler for FfmpegFrameSampler {
    async fn sample(&self, video: &[u8], count: usize) -> Result<Vec<SampledFrame>> {
        let mut scratch = self.scratch_file()?;
        stage(&mut scratch, video)?;

        let probe = probe(scratch.path()).await?;
        let indices = frame_indices(probe.total_frames, count);
        info!(
            total_frames = probe.total_frames,
            fps = probe.fps,
            samples = indices.len(),
            "Sampling video frames"
        );

        let path = scratch.path();
        Ok(collect_frames(indices, probe.fps, |index| extract_frame(path, index)).await)
    }
}

/// Extract and re-encode each index. Frames that cannot be read are skipped.
async fn collect_frames<F, Fut>(indices: Vec<u64>, fps: f64, mut extract: F) -> Vec<SampledFrame>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<Vec<u8>>>,
{
    let mut frames = Vec::with_capacity(indices.len());
    for index in indices {
        let jpeg = match extract(index).await.and_then(|raw| reencode_frame(&raw, index)) {
            Ok(jpeg) => jpeg,
            Err(e) => {
                warn!(frame = index, error = %e, "Skipping unreadable frame");
                continue;
            }
        };

        frames.push(SampledFrame {
            frame_number: index,
            timestamp: if fps > 0.0 { index as f64 / fps } else { 0.0 },
            image: STANDARD.encode(jpeg),
        });
        debug!(frame = index, "Frame extracted");
    }
    frames
}

fn reencode_frame(raw: &[u8], index: u64) -> Result<Vec<u8>> {
    let image = image::load_from_memory(raw)
        .map_err(|e| FlowError::Media(format!("Could not decode frame {}: {}", index, e)))?;
    encode_jpeg(&image, Some(FRAME_JPEG_QUALITY))
}

fn stage(file: &mut NamedTempFile, video: &[u8]) -> Result<()> {
    file.write_all(video)
        .and_then(|_| file.flush())
        .map_err(|e| FlowError::Media(format!("Failed to stage video: {}", e)))
}

#[derive(Debug)]
struct ProbeResult {
    total_frames: u64,
    fps: f64,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    nb_read_packets: Option<String>,
    r_frame_rate: Option<String>,
}

async fn run(command: &mut Command) -> Result<Vec<u8>> {
    run_with_timeout(command, COMMAND_TIMEOUT).await
}

/// Run `command` to completion. The child is killed if `limit` elapses first.
async fn run_with_timeout(command: &mut Command, limit: Duration) -> Result<Vec<u8>> {
    command.kill_on_drop(true);

    let timed_out =
        || FlowError::Media(format!("Command timed out after {}s", limit.as_secs_f64()));
    let output = tokio::time::timeout(limit, command.output())
        .await
        .map_err(|_| timed_out())?
        .map_err(|e| FlowError::Media(format!("Failed to run command: {}", e)))?;

    if !output.status.success() {
        return Err(FlowError::Media(format!(
            "Command failed (exit {:?}): {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(output.stdout)
}

async fn probe(path: &Path) -> Result<ProbeResult> {
    let stdout = run(Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-count_packets",
            "-show_entries",
            "stream=nb_read_packets,r_frame_rate",
            "-of",
            "json",
        ])
        .arg(path))
    .await?;

    parse_probe(&stdout)
}

fn parse_probe(stdout: &[u8]) -> Result<ProbeResult> {
    let output: FfprobeOutput = serde_json::from_slice(stdout)
        .map_err(|e| FlowError::Media(format!("Failed to parse ffprobe output: {}", e)))?;
    let stream = output
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| FlowError::Media("No video stream found".to_string()))?;

    let total_frames = stream
        .nb_read_packets
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(0);
    let fps = stream
        .r_frame_rate
        .as_deref()
        .map(parse_frame_rate)
        .unwrap_or(0.0);

    Ok(ProbeResult { total_frames, fps })
}

/// Parse `"30000/1001"` or `"25"` into frames per second.
fn parse_frame_rate(raw: &str) -> f64 {
    match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().unwrap_or(0.0);
            let den: f64 = den.parse().unwrap_or(0.0);
            if den > 0.0 { num / den } else { 0.0 }
        }
        None => raw.parse().unwrap_or(0.0),
    }
}

async fn extract_frame(path: &Path, index: u64) -> Result<Vec<u8>> {
    run(Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args([
            "-vf",
            &format!("select=eq(n\\,{})", index),
            "-vframes",
            "1",
            "-f",
            "image2pipe",
            "-vcodec",
            "png",
            "-",
        ]))
    .await
}

/// A 200x200 cartoon face used to exercise the image pipeline without an upload.
pub fn synthetic_face() -> Result<Vec<u8>> {
    const SKIN: Rgb<u8> = Rgb([0xFF, 0xE4, 0xB5]);
    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
    const WHITE: Rgb<u8> = Rgb([0xFF, 0xFF, 0xFF]);
    const PINK: Rgb<u8> = Rgb([0xFF, 0xB6, 0xC1]);
    const RED: Rgb<u8> = Rgb([0xFF, 0, 0]);

    let mut canvas = RgbImage::from_pixel(200, 200, SKIN);

    for (x, y, pixel) in canvas.enumerate_pixels_mut() {
        let (x, y) = (x as f64 + 0.5, y as f64 + 0.5);

        let face = ellipse(x, y, (100.0, 100.0), (50.0, 60.0));
        let eyes = [(82.5, 85.0), (117.5, 85.0)];
        let in_eye = eyes
            .iter()
            .map(|&center| ellipse(x, y, center, (12.5, 10.0)))
            .fold(f64::MAX, f64::min);
        let in_pupil = eyes
            .iter()
            .map(|&center| ellipse(x, y, center, (5.5, 3.0)))
            .fold(f64::MAX, f64::min);
        let mouth = ellipse(x, y, (100.0, 125.0), (10.0, 5.0));
        let in_nose = (100.0..=115.0).contains(&y) && (x - 100.0).abs() <= (y - 100.0) / 3.0;

        *pixel = if in_pupil <= 1.0 {
            BLACK
        } else if in_eye <= 1.0 {
            WHITE
        } else if in_nose {
            PINK
        } else if y >= 125.0 && (0.8..=1.2).contains(&mouth) {
            RED
        } else if (0.92..=1.0).contains(&face) || (0.85..=1.0).contains(&in_eye) {
            BLACK
        } else {
            SKIN
        };
    }

    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(canvas)
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
        .map_err(|e| FlowError::Media(format!("Failed to encode test image: {}", e)))?;
    Ok(buffer)
}

/// Normalized ellipse equation: `<= 1.0` inside, `> 1.0` outside.
fn ellipse(x: f64, y: f64, center: (f64, f64), radii: (f64, f64)) -> f64 {
    let dx = (x - center.0) / radii.0;
    let dy = (y - center.1) / radii.1;
    dx * dx + dy * dy
}

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use log::info;
use rayon::prelude::*;

use crate::bits;
use crate::config::{self, FvidConfig};
use crate::container;
use crate::crypto::Key;
use crate::frame;
use crate::sequencer;
use crate::video::{FrameStore, Transcoder};

use super::progress_bar;

/// In-memory encode: bytes -> container -> bitstream -> frames, in order.
pub fn encode_bytes(
    data: &[u8],
    filename: &str,
    key: &Key,
    cfg: &FvidConfig,
) -> Result<Vec<RgbImage>> {
    frame::check_resolution(cfg.frame_width, cfg.frame_height)?;
    let blob = container::build(data, filename, key).context("failed to build container")?;
    let bitstream = bits::to_bits(&blob);
    Ok(sequencer::encode_frames(&bitstream, cfg.frame_width, cfg.frame_height)?)
}

/// Full encode pipeline: file -> container -> frames on disk -> video.
///
/// Returns the path of the written video. The frame directory is removed
/// before returning, on success or failure.
pub fn encode_file(
    input_path: &Path,
    output_path: Option<&Path>,
    key: &Key,
    cfg: &FvidConfig,
    transcoder: &dyn Transcoder,
) -> Result<PathBuf> {
    frame::check_resolution(cfg.frame_width, cfg.frame_height)?;
    let output_path = output_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_VIDEO_OUTPUT));

    // Step 1: Read the file and build the container
    info!("reading file: {}", input_path.display());
    let data = fs::read(input_path)
        .with_context(|| format!("failed to read input file {}", input_path.display()))?;
    let filename = input_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("input path has no file name: {}", input_path.display()))?;

    info!("encrypting and compressing {} bytes", data.len());
    let blob = container::build(&data, &filename, key).context("failed to build container")?;
    drop(data);

    // Step 2: Cut the bitstream into frames
    let bitstream = bits::to_bits(&blob);
    let chunk_len = cfg.bits_per_frame();
    let num_frames = config::frames_for_bits(bitstream.len(), cfg.frame_width, cfg.frame_height);
    info!(
        "container is {} bytes, {} frames at {}x{}",
        blob.len(),
        num_frames,
        cfg.frame_width,
        cfg.frame_height
    );

    let store = FrameStore::new().context("failed to create frame directory")?;
    let progress = progress_bar(num_frames, "frames written", "cyan/blue")?;

    // Step 3: Render and save frames in parallel; collect keeps frame order
    let frame_paths: Vec<PathBuf> = (1..=num_frames)
        .into_par_iter()
        .map(|index| -> Result<PathBuf> {
            let chunk = sequencer::chunk_at(&bitstream, chunk_len, index)
                .ok_or_else(|| anyhow!("frame {} is outside the bitstream", index))?;
            let image = frame::encode_frame(&chunk, cfg.frame_width, cfg.frame_height)?;
            let path = store
                .write_frame(index, &image)
                .with_context(|| format!("failed to save frame {}", index))?;
            progress.inc(1);
            Ok(path)
        })
        .collect::<Result<_>>()?;

    progress.finish_with_message("frames written");

    // Step 4: Hand the frames to the transcoder
    transcoder
        .mux(&frame_paths, &cfg.framerate, &output_path)
        .context("failed to create video")?;

    info!("encode complete! output: {}", output_path.display());
    Ok(output_path)
}

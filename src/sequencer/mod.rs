use image::RgbImage;
use rayon::prelude::*;

use crate::config;
use crate::frame::{self, FrameError, PixelClassifier};

/// Split a bitstream into `chunk_len`-bit chunks, zero-padding only the last one.
///
/// Chunk `i` of the result is frame `i + 1`. Yields `ceil(bits.len() / chunk_len)`
/// chunks; an empty bitstream or a zero chunk length yields none.
pub fn chunk_bits(bits: &[bool], chunk_len: usize) -> Vec<Vec<bool>> {
    if chunk_len == 0 {
        return Vec::new();
    }

    bits.chunks(chunk_len)
        .map(|slice| {
            let mut chunk = slice.to_vec();
            chunk.resize(chunk_len, false);
            chunk
        })
        .collect()
}

/// Copy out the chunk with 1-based `index` without materialising the rest.
/// The last chunk is padded; indices outside the sequence give `None`.
pub fn chunk_at(bits: &[bool], chunk_len: usize, index: usize) -> Option<Vec<bool>> {
    if index == 0 || chunk_len == 0 {
        return None;
    }
    let start = (index - 1).checked_mul(chunk_len)?;
    if start >= bits.len() {
        return None;
    }
    let end = (start + chunk_len).min(bits.len());
    let mut chunk = bits[start..end].to_vec();
    chunk.resize(chunk_len, false);
    Some(chunk)
}

/// Render every chunk of `bits` as a frame, in order. Frames are rendered in parallel.
pub fn encode_frames(bits: &[bool], width: u32, height: u32) -> Result<Vec<RgbImage>, FrameError> {
    frame::check_resolution(width, height)?;
    let chunk_len = config::bits_per_frame(width, height);
    chunk_bits(bits, chunk_len)
        .par_iter()
        .map(|chunk| frame::encode_frame(chunk, width, height))
        .collect()
}

/// Classify each frame and concatenate the bits in frame order.
///
/// The result keeps the final frame's zero padding; the container framing
/// decides where the payload really ends.
pub fn decode_frames(frames: &[RgbImage], classifier: &dyn PixelClassifier) -> Vec<bool> {
    let per_frame: Vec<Vec<bool>> = frames.par_iter().map(|f| classifier.classify(f)).collect();
    per_frame.concat()
}

use std::sync::OnceLock;

use image::{Rgb, RgbImage};
use log::debug;
use rayon::prelude::*;
use thiserror::Error;

use crate::config;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid chunk size: frame needs exactly {expected} bits, got {got}")]
    InvalidChunkSize { expected: usize, got: usize },
    #[error("frame resolution must be non-zero, got {width}x{height}")]
    EmptyResolution { width: u32, height: u32 },
}

/// A frame must hold at least one pixel.
pub fn check_resolution(width: u32, height: u32) -> Result<(), FrameError> {
    if width == 0 || height == 0 {
        return Err(FrameError::EmptyResolution { width, height });
    }
    Ok(())
}

/// Render exactly `width * height` bits as a black/white frame, row-major.
/// Bit 1 is white, bit 0 is black.
pub fn encode_frame(bits: &[bool], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    check_resolution(width, height)?;
    let expected = config::bits_per_frame(width, height);
    if bits.len() != expected {
        return Err(FrameError::InvalidChunkSize {
            expected,
            got: bits.len(),
        });
    }

    let mut frame = RgbImage::new(width, height);
    for (pixel, &bit) in frame.pixels_mut().zip(bits) {
        *pixel = if bit { WHITE } else { BLACK };
    }
    Ok(frame)
}

/// Read one bit per pixel back out of a frame using the classifier chosen at startup.
pub fn decode_frame(frame: &RgbImage) -> Vec<bool> {
    classifier().classify(frame)
}

/// Strategy for turning frame pixels back into bits.
///
/// A pixel is `1` iff each of its channels is strictly closer to 255 than to 0.
/// Every implementation must agree with [`ReferenceClassifier`] on every input.
pub trait PixelClassifier: Send + Sync {
    fn name(&self) -> &'static str;
    fn classify(&self, frame: &RgbImage) -> Vec<bool>;
}

/// Straightforward per-pixel distance comparison.
pub struct ReferenceClassifier;

impl PixelClassifier for ReferenceClassifier {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn classify(&self, frame: &RgbImage) -> Vec<bool> {
        frame
            .pixels()
            .map(|Rgb(channels)| channels.iter().all(|&c| c.abs_diff(255) < c.abs_diff(0)))
            .collect()
    }
}

/// Branch-free row-parallel classifier.
///
/// `|c - 255| < |c - 0|` holds exactly when `c >= 128`, i.e. when the high bit
/// is set, so a pixel is white iff the AND of its three channels has bit 7 set.
pub struct BulkClassifier;

impl PixelClassifier for BulkClassifier {
    fn name(&self) -> &'static str {
        "bulk"
    }

    fn classify(&self, frame: &RgbImage) -> Vec<bool> {
        let width = frame.width() as usize;
        let mut bits = vec![false; width * frame.height() as usize];
        if width == 0 {
            return bits;
        }

        bits.par_chunks_mut(width)
            .zip(frame.as_raw().par_chunks(width * 3))
            .for_each(|(row_bits, row_pixels)| {
                for (bit, px) in row_bits.iter_mut().zip(row_pixels.chunks_exact(3)) {
                    *bit = (px[0] & px[1] & px[2]) & 0x80 != 0;
                }
            });
        bits
    }
}

/// The classifier used by [`decode_frame`]. Picked once per process: the bulk
/// path when rayon has more than one worker, the reference loop otherwise.
pub fn classifier() -> &'static dyn PixelClassifier {
    static SELECTED: OnceLock<&'static dyn PixelClassifier> = OnceLock::new();
    *SELECTED.get_or_init(|| {
        let selected: &'static dyn PixelClassifier = if rayon::current_num_threads() > 1 {
            &BulkClassifier
        } else {
            &ReferenceClassifier
        };
        debug!("pixel classifier: {}", selected.name());
        selected
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(len: usize) -> Vec<bool> {
        (0..len).map(|i| (i * 7 + i / 3) % 5 < 2).collect()
    }

    #[test]
    fn test_encode_maps_bits_to_black_and_white() {
        let bits = [true, false, false, true];
        let frame = encode_frame(&bits, 2, 2).unwrap();
        assert_eq!(*frame.get_pixel(0, 0), WHITE);
        assert_eq!(*frame.get_pixel(1, 0), BLACK);
        assert_eq!(*frame.get_pixel(0, 1), BLACK);
        assert_eq!(*frame.get_pixel(1, 1), WHITE);
    }

    #[test]
    fn test_encode_rejects_wrong_chunk_size() {
        assert_eq!(
            encode_frame(&[true; 15], 4, 4),
            Err(FrameError::InvalidChunkSize {
                expected: 16,
                got: 15
            })
        );
        assert!(encode_frame(&[true; 17], 4, 4).is_err());
    }

    #[test]
    fn test_encode_rejects_empty_resolution() {
        assert_eq!(
            encode_frame(&[], 0, 4),
            Err(FrameError::EmptyResolution {
                width: 0,
                height: 4
            })
        );
        assert!(check_resolution(3, 0).is_err());
        assert!(check_resolution(1, 1).is_ok());
    }

    #[test]
    fn test_frame_roundtrip() {
        let bits = pattern(37 * 11);
        let frame = encode_frame(&bits, 37, 11).unwrap();
        assert_eq!(decode_frame(&frame), bits);
        assert_eq!(ReferenceClassifier.classify(&frame), bits);
        assert_eq!(BulkClassifier.classify(&frame), bits);
    }

    #[test]
    fn test_threshold_tolerates_small_artifacts() {
        let mut frame = RgbImage::new(4, 1);
        frame.put_pixel(0, 0, Rgb([250, 240, 200]));
        frame.put_pixel(1, 0, Rgb([3, 10, 60]));
        frame.put_pixel(2, 0, Rgb([128, 128, 128]));
        frame.put_pixel(3, 0, Rgb([255, 255, 127]));

        let expected = vec![true, false, true, false];
        assert_eq!(ReferenceClassifier.classify(&frame), expected);
        assert_eq!(BulkClassifier.classify(&frame), expected);
    }

    #[test]
    fn test_classifiers_agree_on_every_channel_value() {
        let mut frame = RgbImage::new(256, 3);
        for v in 0..=255u8 {
            frame.put_pixel(v as u32, 0, Rgb([v, 255, 255]));
            frame.put_pixel(v as u32, 1, Rgb([255, v, 200]));
            frame.put_pixel(v as u32, 2, Rgb([v, v, v]));
        }
        assert_eq!(
            ReferenceClassifier.classify(&frame),
            BulkClassifier.classify(&frame)
        );
    }

    #[test]
    fn test_classifier_selection_is_stable() {
        let first = classifier().name();
        let second = classifier().name();
        assert_eq!(first, second);
    }
}

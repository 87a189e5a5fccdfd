use std::io;
use std::path::{Path, PathBuf};

use glob::{glob, Pattern};
use image::RgbImage;
use log::debug;
use tempfile::TempDir;

use crate::config;
use crate::video::VideoError;

/// Scratch directory holding one run's frame images.
///
/// Created before the run; removed when dropped, whether the run succeeded or not.
pub struct FrameStore {
    dir: TempDir,
}

impl FrameStore {
    /// Create a fresh frame directory under the system temp dir.
    pub fn new() -> Result<Self, VideoError> {
        let dir = tempfile::Builder::new()
            .prefix(config::FRAME_DIR_PREFIX)
            .tempdir()?;
        debug!("frame directory: {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// `<dir>/<prefix><index>.png`, 1-based.
    pub fn frame_path(&self, prefix: &str, index: usize) -> PathBuf {
        frame_file(self.path(), prefix, index)
    }

    /// Save an encoded frame as `encoded_frames_<index>.png`.
    pub fn write_frame(&self, index: usize, frame: &RgbImage) -> Result<PathBuf, VideoError> {
        let path = self.frame_path(config::ENCODED_FRAME_PREFIX, index);
        frame.save(&path)?;
        Ok(path)
    }
}

pub fn frame_file(dir: &Path, prefix: &str, index: usize) -> PathBuf {
    dir.join(format!("{}{}.{}", prefix, index, config::FRAME_EXTENSION))
}

/// Load a frame image as 8-bit RGB regardless of how it was stored.
pub fn read_frame(path: &Path) -> Result<RgbImage, VideoError> {
    Ok(image::open(path)?.to_rgb8())
}

/// List `<prefix><n>.png` files in `dir` ordered by `n`.
///
/// Order comes from the number in the name, never from directory or mtime
/// order. The indices must run 1..=len with no gaps.
pub fn list_frames(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>, VideoError> {
    let pattern = format!(
        "{}/{}*.{}",
        Pattern::escape(&dir.to_string_lossy()),
        prefix,
        config::FRAME_EXTENSION
    );

    let mut indexed: Vec<(usize, PathBuf)> = Vec::new();
    let entries = glob(&pattern).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    for entry in entries {
        let path = entry.map_err(|e| e.into_error())?;
        let index = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.strip_prefix(prefix))
            .and_then(|digits| digits.parse::<usize>().ok());
        if let Some(index) = index {
            indexed.push((index, path));
        }
    }

    if indexed.is_empty() {
        return Err(VideoError::NoFrames);
    }

    indexed.sort_by_key(|(index, _)| *index);
    for (expected, (index, _)) in (1..).zip(&indexed) {
        if *index != expected {
            return Err(VideoError::MissingFrame(expected));
        }
    }

    Ok(indexed.into_iter().map(|(_, path)| path).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame;

    fn tiny_frame() -> RgbImage {
        frame::encode_frame(&[true, false, false, true], 2, 2).unwrap()
    }

    #[test]
    fn test_store_is_removed_on_drop() {
        let store = FrameStore::new().unwrap();
        let dir = store.path().to_path_buf();
        store.write_frame(1, &tiny_frame()).unwrap();
        assert!(dir.exists());
        drop(store);
        assert!(!dir.exists());
    }

    #[test]
    fn test_write_and_read_frame() {
        let store = FrameStore::new().unwrap();
        let path = store.write_frame(1, &tiny_frame()).unwrap();
        assert_eq!(path.file_name().unwrap(), "encoded_frames_1.png");
        assert_eq!(read_frame(&path).unwrap(), tiny_frame());
    }

    #[test]
    fn test_list_frames_uses_numeric_order() {
        let store = FrameStore::new().unwrap();
        for index in [10, 2, 1, 3, 4, 5, 6, 7, 8, 9, 11] {
            store.write_frame(index, &tiny_frame()).unwrap();
        }
        std::fs::write(store.path().join("unrelated.txt"), b"x").unwrap();

        let frames = list_frames(store.path(), config::ENCODED_FRAME_PREFIX).unwrap();
        let names: Vec<String> = frames
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        let expected: Vec<String> = (1..=11)
            .map(|i| format!("encoded_frames_{}.png", i))
            .collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_list_frames_detects_gap() {
        let store = FrameStore::new().unwrap();
        for index in [1, 2, 4] {
            store.write_frame(index, &tiny_frame()).unwrap();
        }
        let result = list_frames(store.path(), config::ENCODED_FRAME_PREFIX);
        assert!(matches!(result, Err(VideoError::MissingFrame(3))));
    }

    #[test]
    fn test_list_frames_empty_dir() {
        let store = FrameStore::new().unwrap();
        let result = list_frames(store.path(), config::DECODED_FRAME_PREFIX);
        assert!(matches!(result, Err(VideoError::NoFrames)));
    }
}

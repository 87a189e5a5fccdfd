use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use log::{debug, info};
use rayon::prelude::*;
use tempfile::NamedTempFile;

use crate::bits;
use crate::container::{self, Opened};
use crate::crypto::Key;
use crate::frame::{self, PixelClassifier};
use crate::sequencer;
use crate::video::{store, FrameStore, Transcoder};

use super::progress_bar;

/// In-memory decode: frames (in order) -> bitstream -> container -> bytes.
pub fn decode_frames(
    frames: &[RgbImage],
    key: &Key,
    classifier: &dyn PixelClassifier,
) -> Result<Opened> {
    let bitstream = sequencer::decode_frames(frames, classifier);
    let blob = bits::from_bits(&bitstream);
    Ok(container::open(&blob, key)?)
}

/// Full decode pipeline: video -> frames on disk -> bitstream -> container -> file.
///
/// When `output_path` is `None` the file name recorded in the container is
/// used. Nothing is written unless the container authenticates, and the file
/// only appears at its final path once it is complete. Returns the path that
/// was written.
pub fn decode_file(
    input_path: &Path,
    output_path: Option<&Path>,
    key: &Key,
    transcoder: &dyn Transcoder,
) -> Result<PathBuf> {
    let frame_store = FrameStore::new().context("failed to create frame directory")?;

    // Step 1: Split the video into ordered frame images
    info!("decoding video: {}", input_path.display());
    let frame_paths = transcoder
        .demux(input_path, frame_store.path())
        .context("failed to extract frames from video")?;
    info!("extracted {} frames", frame_paths.len());

    // Step 2: Classify pixels back into bits, frame by frame, keeping order
    let classifier = frame::classifier();
    let progress = progress_bar(frame_paths.len(), "frames read", "green/black")?;
    let per_frame: Vec<Vec<bool>> = frame_paths
        .par_iter()
        .map(|path| -> Result<Vec<bool>> {
            let image = store::read_frame(path)
                .with_context(|| format!("failed to read frame {}", path.display()))?;
            progress.inc(1);
            Ok(classifier.classify(&image))
        })
        .collect::<Result<_>>()?;
    progress.finish_with_message("frames read");

    // Step 3: Reassemble the container and authenticate it
    let blob = bits::from_bits(&per_frame.concat());
    drop(per_frame);
    info!("checking integrity of {} byte container", blob.len());
    let opened = container::open(&blob, key)?;

    // Step 4: Write the file
    let output_path = match output_path {
        Some(path) => path.to_path_buf(),
        None => recorded_output_path(&opened.filename)?,
    };
    write_atomically(&output_path, &opened.data)
        .with_context(|| format!("failed to write output file {}", output_path.display()))?;

    info!("decode complete! output: {}", output_path.display());
    Ok(output_path)
}

/// Only the last component of the recorded name is used, so a crafted
/// container cannot direct the write outside the working directory.
fn recorded_output_path(recorded: &str) -> Result<PathBuf> {
    Path::new(recorded)
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("recorded file name {:?} is not usable; pass --output", recorded))
}

/// Write into a temp file next to `path`, then rename it over `path`.
///
/// On any failure the temp file is removed and `path` is left untouched.
fn write_atomically(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    debug!("staging output in {}", file.path().display());
    file.write_all(data)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;
    use std::fs;

    use super::*;

    fn dir_entries(dir: &Path) -> Vec<OsString> {
        let mut names: Vec<OsString> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_write_atomically_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.bin");
        fs::write(&target, b"old contents that are longer").unwrap();

        write_atomically(&target, b"new").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"new");
        assert_eq!(dir_entries(dir.path()), vec![OsString::from("out.bin")]);
    }

    #[test]
    fn test_failed_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("taken");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("inner"), b"x").unwrap();

        assert!(write_atomically(&target, b"payload").is_err());
        assert!(target.is_dir());
        assert_eq!(dir_entries(dir.path()), vec![OsString::from("taken")]);
        assert_eq!(fs::read(target.join("inner")).unwrap(), b"x");
    }

    #[test]
    fn test_recorded_output_path_strips_directories() {
        assert_eq!(
            recorded_output_path("notes.txt").unwrap(),
            PathBuf::from("notes.txt")
        );
        assert_eq!(
            recorded_output_path("../../etc/passwd").unwrap(),
            PathBuf::from("passwd")
        );
        assert_eq!(
            recorded_output_path("/abs/dir/data.bin").unwrap(),
            PathBuf::from("data.bin")
        );
        assert!(recorded_output_path("").is_err());
        assert!(recorded_output_path("..").is_err());
    }
}

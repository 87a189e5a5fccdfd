pub mod ffmpeg;
pub mod store;

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use thiserror::Error;

use crate::config::Framerate;

pub use ffmpeg::Ffmpeg;
pub use store::FrameStore;

#[derive(Error, Debug)]
pub enum VideoError {
    #[error("failed to run {tool}: {source} (is it installed?)")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("frame sequence has a gap: frame {0} is missing")]
    MissingFrame(usize),
    #[error("no frames to process")]
    NoFrames,
    #[error("frame image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("frame storage error: {0}")]
    Io(#[from] io::Error),
}

/// The external tool that turns ordered frame images into a video and back.
///
/// Implementations must keep frame order and reproduce pixel values exactly;
/// nothing inside a frame records its position in the sequence.
pub trait Transcoder {
    /// Combine `frames` (in order, all in one directory) into `output`.
    fn mux(
        &self,
        frames: &[PathBuf],
        framerate: &Framerate,
        output: &Path,
    ) -> Result<(), VideoError>;

    /// Split `video` into frame images inside `frames_dir`, returned in order.
    fn demux(&self, video: &Path, frames_dir: &Path) -> Result<Vec<PathBuf>, VideoError>;
}

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::info;

use crate::config::{self, Framerate};
use crate::video::store::{frame_file, list_frames};
use crate::video::{Transcoder, VideoError};

/// Drives the `ffmpeg` CLI. Arguments are passed as a vector, never through a shell.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: PathBuf,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
        }
    }
}

impl Ffmpeg {
    /// Use a specific ffmpeg binary instead of the one on `$PATH`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments for muxing `<dir>/encoded_frames_%d.png` into a lossless RGB video.
    ///
    /// `libx264rgb` with `-qp 0` keeps every pixel exact; chroma subsampling or
    /// lossy quantization would corrupt the black/white classification.
    pub fn mux_args(frames_dir: &Path, framerate: &Framerate, output: &Path) -> Vec<OsString> {
        let pattern = frames_dir.join(format!(
            "{}%d.{}",
            config::ENCODED_FRAME_PREFIX,
            config::FRAME_EXTENSION
        ));
        vec![
            "-y".into(),
            "-framerate".into(),
            framerate.to_string().into(),
            "-start_number".into(),
            "1".into(),
            "-i".into(),
            pattern.into_os_string(),
            "-c:v".into(),
            "libx264rgb".into(),
            "-qp".into(),
            "0".into(),
            "-pix_fmt".into(),
            "rgb24".into(),
            output.as_os_str().to_owned(),
        ]
    }

    /// Arguments for splitting `video` into `<dir>/decoded_frames_%d.png`, one file per frame.
    pub fn demux_args(video: &Path, frames_dir: &Path) -> Vec<OsString> {
        let pattern = frames_dir.join(format!(
            "{}%d.{}",
            config::DECODED_FRAME_PREFIX,
            config::FRAME_EXTENSION
        ));
        vec![
            "-i".into(),
            video.as_os_str().to_owned(),
            "-vsync".into(),
            "0".into(),
            pattern.into_os_string(),
        ]
    }

    fn run(&self, args: &[OsString]) -> Result<(), VideoError> {
        let tool = self.program.display().to_string();
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| VideoError::Spawn {
                tool: tool.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            return Err(VideoError::Failed {
                tool,
                status: output.status,
                stderr: tail.into_iter().rev().collect::<Vec<_>>().join("\n"),
            });
        }
        Ok(())
    }
}

impl Transcoder for Ffmpeg {
    fn mux(
        &self,
        frames: &[PathBuf],
        framerate: &Framerate,
        output: &Path,
    ) -> Result<(), VideoError> {
        let first = frames.first().ok_or(VideoError::NoFrames)?;
        let frames_dir = first.parent().unwrap_or_else(|| Path::new("."));

        // ffmpeg reads frames by pattern, so the paths must be exactly 1..=n in one directory
        for (i, path) in frames.iter().enumerate() {
            if *path != frame_file(frames_dir, config::ENCODED_FRAME_PREFIX, i + 1) {
                return Err(VideoError::MissingFrame(i + 1));
            }
        }

        info!(
            "muxing {} frames at {} fps into {}",
            frames.len(),
            framerate,
            output.display()
        );
        self.run(&Self::mux_args(frames_dir, framerate, output))
    }

    fn demux(&self, video: &Path, frames_dir: &Path) -> Result<Vec<PathBuf>, VideoError> {
        info!("extracting frames from {}", video.display());
        self.run(&Self::demux_args(video, frames_dir))?;
        list_frames(frames_dir, config::DECODED_FRAME_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_strings(args: &[OsString]) -> Vec<String> {
        args.iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_mux_args_are_lossless_and_unquoted() {
        let rate: Framerate = "1/3".parse().unwrap();
        let args = as_strings(&Ffmpeg::mux_args(
            Path::new("/tmp/frames"),
            &rate,
            Path::new("out; rm -rf ~.mp4"),
        ));

        assert_eq!(args[0], "-y");
        assert_eq!(args[1..3], ["-framerate", "1/3"]);
        assert!(args.contains(&"/tmp/frames/encoded_frames_%d.png".to_string()));
        assert!(args.windows(2).any(|w| w == ["-c:v", "libx264rgb"]));
        assert!(args.windows(2).any(|w| w == ["-qp", "0"]));
        // the output path stays a single argument
        assert_eq!(args.last().unwrap(), "out; rm -rf ~.mp4");
    }

    #[test]
    fn test_demux_args() {
        let args = as_strings(&Ffmpeg::demux_args(
            Path::new("video.mp4"),
            Path::new("/tmp/frames"),
        ));
        assert_eq!(args.len(), 5);
        assert_eq!(args[..4], ["-i", "video.mp4", "-vsync", "0"]);
        assert_eq!(args[4], "/tmp/frames/decoded_frames_%d.png");
    }

    #[test]
    fn test_mux_rejects_empty_and_misnamed_frames() {
        let ffmpeg = Ffmpeg::with_program("/nonexistent/ffmpeg");
        let rate = Framerate::default();

        let result = ffmpeg.mux(&[], &rate, Path::new("out.mp4"));
        assert!(matches!(result, Err(VideoError::NoFrames)));

        let frames = vec![
            PathBuf::from("/tmp/f/encoded_frames_1.png"),
            PathBuf::from("/tmp/f/encoded_frames_3.png"),
        ];
        let result = ffmpeg.mux(&frames, &rate, Path::new("out.mp4"));
        assert!(matches!(result, Err(VideoError::MissingFrame(2))));
    }

    #[test]
    fn test_missing_binary_is_spawn_error() {
        let ffmpeg = Ffmpeg::with_program("/nonexistent/ffmpeg");
        let dir = tempfile::tempdir().unwrap();
        let result = ffmpeg.demux(Path::new("video.mp4"), dir.path());
        assert!(matches!(result, Err(VideoError::Spawn { .. })));
    }
}

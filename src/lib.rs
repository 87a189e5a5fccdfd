//! Store arbitrary files as sequences of black/white video frames and back.
//!
//! A file is encrypted and authenticated under a password-derived key, wrapped
//! with its name in a gzip-compressed container, spread over frames at one bit
//! per pixel, and handed to ffmpeg for lossless muxing. Decoding reverses each
//! step and refuses to write anything unless the container authenticates.

pub mod bits;
pub mod config;
pub mod container;
pub mod crypto;
pub mod frame;
pub mod pipeline;
pub mod sequencer;
pub mod video;

pub use config::{Framerate, FramerateError, FvidConfig};
pub use container::{ContainerError, Opened};
pub use crypto::{
    derive_key, resolve_key, Key, Password, SecretProvider, StaticSecret, TerminalPrompt,
};
pub use frame::{BulkClassifier, FrameError, PixelClassifier, ReferenceClassifier};
pub use pipeline::decode::{decode_file, decode_frames};
pub use pipeline::encode::{encode_bytes, encode_file};
pub use video::{Ffmpeg, FrameStore, Transcoder, VideoError};

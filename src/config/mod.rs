use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Fixed salt shared by key derivation and the cipher nonce.
///
/// Every encode/decode of this program must use the same value, so it is a
/// compile-time constant rather than per-message data.
pub const SALT: &[u8; 32] = b"63929291bca3c602de64352a4d4bfe69";

/// Key used when the caller opts into `--password default`.
///
/// Anyone can decode such a video. It exists for testing and interop only.
pub const DEFAULT_KEY: [u8; KEY_SIZE] = [b' '; KEY_SIZE];

/// Literal password value that selects [`DEFAULT_KEY`].
pub const DEFAULT_PASSWORD: &str = "default";

// PBKDF2-HMAC-SHA512 parameters
pub const KDF_ITERATIONS: u32 = 100_000;
pub const KEY_SIZE: usize = 32;

// XChaCha20-Poly1305
pub const NONCE_SIZE: usize = 24;
pub const TAG_SIZE: usize = 16;

// Container record
pub const MAGIC: &[u8; 4] = b"FVID";
pub const CONTAINER_VERSION: u8 = 1;
pub const FIELD_HEADER_SIZE: usize = 5; // id (1) + length (4)
pub const FIELD_TAG: u8 = 1;
pub const FIELD_CIPHERTEXT: u8 = 2;
pub const FIELD_FILENAME: u8 = 3;

// Video parameters
pub const DEFAULT_FRAME_WIDTH: u32 = 1920;
pub const DEFAULT_FRAME_HEIGHT: u32 = 1080;
pub const DEFAULT_FRAMERATE: &str = "1";
pub const DEFAULT_VIDEO_OUTPUT: &str = "file.mp4";

// Frame storage
pub const FRAME_DIR_PREFIX: &str = "fvid_frames";
pub const ENCODED_FRAME_PREFIX: &str = "encoded_frames_";
pub const DECODED_FRAME_PREFIX: &str = "decoded_frames_";
pub const FRAME_EXTENSION: &str = "png";

/// Number of bits carried by one frame.
pub fn bits_per_frame(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

/// Number of frames needed for `bit_len` bits: `ceil(bit_len / (width * height))`.
pub fn frames_for_bits(bit_len: usize, width: u32, height: u32) -> usize {
    bit_len.div_ceil(bits_per_frame(width, height))
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramerateError {
    #[error("invalid framerate {0:?}: must be a positive integer or fraction, like 3, 1/3 or 1/5")]
    InvalidFramerate(String),
}

/// A positive frame rate, either an integer (`3`) or a fraction (`1/3`).
///
/// Parsing is the only way to build one, so a value that reaches the
/// transcoder has already been validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framerate {
    num: u32,
    den: u32,
}

impl Framerate {
    pub fn numerator(&self) -> u32 {
        self.num
    }

    pub fn denominator(&self) -> u32 {
        self.den
    }
}

impl Default for Framerate {
    fn default() -> Self {
        Self { num: 1, den: 1 }
    }
}

impl FromStr for Framerate {
    type Err = FramerateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FramerateError::InvalidFramerate(s.to_string());

        let (num, den) = match s.split_once('/') {
            Some((num, den)) => (parse_positive(num), parse_positive(den)),
            None => (parse_positive(s), Some(1)),
        };

        match (num, den) {
            (Some(num), Some(den)) => Ok(Self { num, den }),
            _ => Err(invalid()),
        }
    }
}

/// Digits only: rejects signs, whitespace and zero.
fn parse_positive(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<u32>().ok().filter(|&n| n > 0)
}

impl fmt::Display for Framerate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

/// Runtime configuration for an encode/decode operation.
#[derive(Debug, Clone)]
pub struct FvidConfig {
    pub frame_width: u32,
    pub frame_height: u32,
    pub framerate: Framerate,
}

impl FvidConfig {
    pub fn bits_per_frame(&self) -> usize {
        bits_per_frame(self.frame_width, self.frame_height)
    }
}

impl Default for FvidConfig {
    fn default() -> Self {
        Self {
            frame_width: DEFAULT_FRAME_WIDTH,
            frame_height: DEFAULT_FRAME_HEIGHT,
            framerate: Framerate::default(),
        }
    }
}

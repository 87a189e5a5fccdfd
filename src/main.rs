use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgGroup, Parser};

use fvid::config::{DEFAULT_FRAMERATE, DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH};
use fvid::{crypto, pipeline, Ffmpeg, Framerate, FvidConfig, Password, TerminalPrompt};

/// fvid: save files as videos.
#[derive(Parser)]
#[command(name = "fvid", version, about)]
#[command(group(ArgGroup::new("mode").required(true).args(["encode", "decode"])))]
struct Cli {
    /// Encode a file as a video
    #[arg(short, long)]
    encode: bool,

    /// Decode a file from a video
    #[arg(short, long)]
    decode: bool,

    /// Input file
    #[arg(short, long)]
    input: PathBuf,

    /// Output path (encode: video, default file.mp4; decode: file, default the recorded name)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Framerate for encoding, as an integer or fraction (e.g. 3, 1/3)
    #[arg(short, long, default_value = DEFAULT_FRAMERATE)]
    framerate: Framerate,

    /// Password; omit the value to be prompted, or pass "default" for the
    /// well-known test key (no confidentiality)
    #[arg(short, long, num_args = 0..=1)]
    password: Option<Option<String>>,

    /// Frame width in pixels
    #[arg(long, default_value_t = DEFAULT_FRAME_WIDTH, value_parser = clap::value_parser!(u32).range(1..))]
    width: u32,

    /// Frame height in pixels
    #[arg(long, default_value_t = DEFAULT_FRAME_HEIGHT, value_parser = clap::value_parser!(u32).range(1..))]
    height: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let cfg = FvidConfig {
        frame_width: cli.width,
        frame_height: cli.height,
        framerate: cli.framerate,
    };

    let password = Password::from_arg(cli.password);
    let key = crypto::resolve_key(&password, &TerminalPrompt)?;
    let ffmpeg = Ffmpeg::default();

    if cli.encode {
        pipeline::encode::encode_file(&cli.input, cli.output.as_deref(), &key, &cfg, &ffmpeg)?;
    } else {
        pipeline::decode::decode_file(&cli.input, cli.output.as_deref(), &key, &ffmpeg)?;
    }

    Ok(())
}

pub mod decode;
pub mod encode;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

fn progress_bar(len: usize, unit: &str, colors: &str) -> Result<ProgressBar> {
    let progress = ProgressBar::new(len as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "[{{elapsed_precise}}] {{bar:40.{}}} {{pos}}/{{len}} {} ({{eta}})",
                colors, unit
            ))?
            .progress_chars("##-"),
    );
    Ok(progress)
}

use crate::services::library;
use crate::Config;
use anyhow::Result;
use std::path::{Path, PathBuf};

pub fn run(config_path: &Path, upload_dir: Option<PathBuf>) -> Result<()> {
    let config = Config::load(config_path)?;
    let upload_dir = upload_dir.unwrap_or(config.media.upload_dir);

    let media = library::list_media(&upload_dir)?;
    if media.is_empty() {
        println!("No media in {}", upload_dir.display());
        return Ok(());
    }

    for item in &media {
        println!(
            "{:<40} {:<11} {:>12}  {}",
            item.name, item.mime, item.size_bytes, item.href
        );
    }
    println!("{} file(s)", media.len());

    Ok(())
}

use crate::{web, Config};
use anyhow::Result;
use std::path::{Path, PathBuf};

pub async fn run(
    config_path: &Path,
    host: Option<String>,
    port: Option<u16>,
    upload_dir: Option<PathBuf>,
) -> Result<()> {
    let mut config = Config::load(config_path)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(upload_dir) = upload_dir {
        config.media.upload_dir = upload_dir;
    }
    config.validate()?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(
        "Starting server at http://{} (uploads in {:?}, max {} per file)",
        addr,
        config.media.upload_dir,
        config.media.max_upload_size
    );

    web::serve(config, &addr).await?;

    Ok(())
}

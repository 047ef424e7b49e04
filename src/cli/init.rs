use anyhow::Result;
use std::path::Path;

const STARTER_CONFIG: &str = r#"[server]
host = "0.0.0.0"
port = 4500

[media]
upload_dir = "./uploads"
max_upload_size = "512MB"
max_request_size = "2GB"
"#;

pub fn run(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;

    let config_path = path.join("reel.toml");
    if config_path.exists() {
        anyhow::bail!("{} already exists", config_path.display());
    }
    std::fs::write(&config_path, STARTER_CONFIG)?;
    std::fs::create_dir_all(path.join("uploads"))?;

    tracing::info!("Created {:?}", config_path);
    tracing::info!("Run 'reel serve' to start the server");

    Ok(())
}

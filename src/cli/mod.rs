pub mod init;
pub mod list;
pub mod serve;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reel")]
#[command(version)]
#[command(about = "Upload MP4, JPEG and PNG files and browse them on one page", long_about = None)]
pub struct Cli {
    #[arg(short, long, default_value = "reel.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server (the default when no command is given)
    Serve {
        #[arg(short = 'H', long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
        #[arg(short, long, env = "REEL_UPLOAD_DIR")]
        upload_dir: Option<PathBuf>,
    },
    /// Print the stored media
    List {
        #[arg(short, long, env = "REEL_UPLOAD_DIR")]
        upload_dir: Option<PathBuf>,
    },
    /// Write a starter reel.toml
    Init {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

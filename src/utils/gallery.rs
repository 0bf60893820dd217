use std::path::PathBuf;
use tokio::process::Command;
use tracing::info;

use crate::error::{other_error, CalResult};

/// External tool used to fetch image galleries
pub const DEFAULT_DOWNLOADER: &str = "gallery-dl";

/// Downloads every image of a remote gallery into a fresh local directory
#[derive(Debug, Clone)]
pub struct GalleryDownloader {
    program: String,
}

impl Default for GalleryDownloader {
    fn default() -> Self {
        Self {
            program: DEFAULT_DOWNLOADER.to_string(),
        }
    }
}

impl GalleryDownloader {
    /// Use `program` instead of `gallery-dl`; it is called as
    /// `program -D <dir> <url>`
    pub fn with_program(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    /// Download `url` and return the directory holding the images
    pub async fn download(&self, url: &str) -> CalResult<PathBuf> {
        // Removed on drop unless the download succeeds
        let dir = tempfile::Builder::new()
            .prefix("calvert-gallery-")
            .tempdir()?;

        info!("Downloading {} into {}", url, dir.path().display());

        Command::new(&self.program)
            .arg("-D")
            .arg(dir.path())
            .arg(url)
            .status()
            .await
            .map_err(|e| other_error(&format!("Failed to run {}: {}", self.program, e)))
            .and_then(|status| {
                if status.success() {
                    Ok(())
                } else {
                    Err(other_error(&format!(
                        "{} exited with {} while downloading {}",
                        self.program, status, url
                    )))
                }
            })?;

        Ok(dir.keep())
    }
}

//! Optional stem-separation capability.
//!
//! Separation is an injected component: the runner receives
//! `Option<Arc<dyn StemSeparator>>` and a missing or unavailable separator
//! silently degrades the feature. Separation failures are logged and never
//! abort the job.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::errors::{AppError, Result};

#[async_trait]
pub trait StemSeparator: Send + Sync {
    /// Whether the backing tool can actually be invoked.
    fn is_available(&self) -> bool;

    /// Split `input` into component tracks under `out_dir`.
    async fn separate(&self, input: &Path, out_dir: &Path) -> Result<()>;

    fn name(&self) -> &str;
}

/// Separator shelling out to a Spleeter-compatible executable
/// (`<command> separate -p <model> -o <out_dir> <input>`).
pub struct SpleeterSeparator {
    command: PathBuf,
    model: String,
}

impl SpleeterSeparator {
    pub fn new(command: impl Into<PathBuf>, model: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            model: model.into(),
        }
    }

    pub fn from_config(config: &crate::config::StemsConfig) -> Self {
        Self::new(&config.command, &config.model)
    }
}

#[async_trait]
impl StemSeparator for SpleeterSeparator {
    fn is_available(&self) -> bool {
        if self.command.components().count() > 1 {
            return self.command.exists();
        }
        let locator = if cfg!(windows) { "where" } else { "which" };
        std::process::Command::new(locator)
            .arg(&self.command)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    async fn separate(&self, input: &Path, out_dir: &Path) -> Result<()> {
        let output = Command::new(&self.command)
            .arg("separate")
            .arg("-p")
            .arg(&self.model)
            .arg("-o")
            .arg(out_dir)
            .arg(input)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| AppError::StemSeparation(format!("Failed to start separator: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::StemSeparation(format!(
                "Separator exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "spleeter"
    }
}

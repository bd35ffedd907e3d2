use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Input extensions treated as audio-only material.
pub const AUDIO_EXTS: &[&str] = &["mp3", "wav", "flac", "aac", "ogg", "m4a"];
/// Input extensions treated as video containers.
pub const VIDEO_EXTS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lower")]
pub enum OutputFormat {
    Mp3,
    Wav,
    Flac,
    Aac,
    Ogg,
    M4a,
    Mp4,
    Mkv,
    Avi,
    Mov,
    Webm,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp3 => "mp3",
            OutputFormat::Wav => "wav",
            OutputFormat::Flac => "flac",
            OutputFormat::Aac => "aac",
            OutputFormat::Ogg => "ogg",
            OutputFormat::M4a => "m4a",
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Mkv => "mkv",
            OutputFormat::Avi => "avi",
            OutputFormat::Mov => "mov",
            OutputFormat::Webm => "webm",
        }
    }

    /// Audio targets drop the video stream entirely; video targets keep it.
    pub fn is_audio(&self) -> bool {
        AUDIO_EXTS.contains(&self.extension())
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[value(rename_all = "lower")]
pub enum QualityTier {
    Low,    // 128 kbps
    Medium, // 192 kbps
    High,   // 320 kbps
}

impl QualityTier {
    pub fn bitrate(&self) -> &'static str {
        match self {
            QualityTier::Low => "128k",
            QualityTier::Medium => "192k",
            QualityTier::High => "320k",
        }
    }
}

/// True when the path carries one of the known audio or video extensions.
pub fn is_media_file(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => {
            let ext = ext.to_lowercase();
            AUDIO_EXTS.contains(&ext.as_str()) || VIDEO_EXTS.contains(&ext.as_str())
        }
        None => false,
    }
}

/// Locate an ffmpeg executable on PATH.
pub fn find_ffmpeg() -> Option<PathBuf> {
    let locator = if cfg!(windows) { "where" } else { "which" };

    if let Ok(output) = std::process::Command::new(locator).arg("ffmpeg").output() {
        if output.status.success() {
            if let Ok(text) = String::from_utf8(output.stdout) {
                let first = text.trim().lines().next().unwrap_or("").to_string();
                if !first.is_empty() {
                    return Some(PathBuf::from(first));
                }
            }
        }
    }

    // Common installation paths
    let common_paths = if cfg!(windows) {
        vec![
            "C:\\ffmpeg\\bin\\ffmpeg.exe",
            "C:\\Program Files\\ffmpeg\\bin\\ffmpeg.exe",
            "C:\\Program Files (x86)\\ffmpeg\\bin\\ffmpeg.exe",
        ]
    } else {
        vec!["/usr/bin/ffmpeg", "/usr/local/bin/ffmpeg", "/opt/homebrew/bin/ffmpeg"]
    };

    for path in common_paths {
        if Path::new(path).exists() {
            return Some(PathBuf::from(path));
        }
    }

    None
}

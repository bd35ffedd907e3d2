pub mod command;
pub mod enhance;
pub mod progress;
pub mod runner;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::media::{OutputFormat, QualityTier};
use crate::utils::generate_job_id;

/// Shared, job-level selections. Built once by the front end and immutable
/// for the lifetime of the job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionSettings {
    pub ffmpeg_path: PathBuf,
    pub output_folder: PathBuf,
    pub format: OutputFormat,
    pub quality: QualityTier,
    pub enhancement: String,
    pub custom_name: Option<String>,
    pub keep_metadata: bool,
    pub separate_stems: bool,
}

/// One user-initiated batch conversion over one or more input files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionJob {
    pub id: String,
    pub input_files: Vec<PathBuf>,
    pub settings: ConversionSettings,
    pub status: JobStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl ConversionJob {
    pub fn new(input_files: Vec<PathBuf>, settings: ConversionSettings) -> Self {
        Self {
            id: generate_job_id(),
            input_files,
            settings,
            status: JobStatus::Pending,
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Stopped,
}

/// Terminal result of a job. A failure names the offending file; no further
/// files are attempted after it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum JobOutcome {
    Completed,
    Failed { file: PathBuf, message: String },
    Stopped,
}

impl JobOutcome {
    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Completed => JobStatus::Completed,
            JobOutcome::Failed { .. } => JobStatus::Failed,
            JobOutcome::Stopped => JobStatus::Stopped,
        }
    }
}

/// Events streamed from the runner to the front end.
#[derive(Debug, Clone)]
pub enum ConversionEvent {
    /// Raw subprocess output or lifecycle text, one line at a time.
    Log(String),
    FileStarted { index: usize, input: PathBuf },
    /// Only emitted once the total duration has been parsed.
    Progress { index: usize, percent: u8 },
    FileCompleted { index: usize, output: PathBuf },
    Finished(JobOutcome),
}

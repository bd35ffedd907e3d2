//! Per-job conversion engine.
//!
//! One background task per job; input files are processed strictly in
//! order, one ffmpeg process at a time. Cancellation is cooperative: the
//! stop flag is checked before each file and on every line of subprocess
//! output, and a stop observed mid-file kills the child process.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;

use crate::convert::command::build_ffmpeg_args;
use crate::convert::enhance;
use crate::convert::progress::ProgressParser;
use crate::convert::{ConversionEvent, ConversionJob, ConversionSettings, JobOutcome, JobStatus};
use crate::errors::{AppError, Result};
use crate::stems::StemSeparator;
use crate::utils::sanitize_filename;

pub struct ConversionRunner {
    stems: Option<Arc<dyn StemSeparator>>,
}

impl ConversionRunner {
    pub fn new() -> Self {
        Self { stems: None }
    }

    pub fn with_stem_separator(mut self, separator: Arc<dyn StemSeparator>) -> Self {
        self.stems = Some(separator);
        self
    }

    /// Start the job on a background task. The caller is never blocked;
    /// progress and log lines arrive on `events`, terminated by a
    /// `Finished` event carrying the outcome. The job record itself tracks
    /// the lifecycle (status and timestamps) and is handed back by
    /// [`JobHandle::wait`].
    pub fn spawn(
        &self,
        mut job: ConversionJob,
        events: UnboundedSender<ConversionEvent>,
    ) -> JobHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let stems = self.stems.clone();
        let job_id = job.id.clone();

        let join = tokio::spawn(async move {
            log::info!("Job {} started ({} files)", job.id, job.input_files.len());
            job.status = JobStatus::Running;
            job.started_at = Some(chrono::Utc::now());

            let outcome = run_job(&job, stems, &events, &stop_flag).await;

            job.status = outcome.status();
            job.completed_at = Some(chrono::Utc::now());
            log::info!("Job {} finished: {:?}", job.id, job.status);
            let _ = events.send(ConversionEvent::Finished(outcome));
            job
        });

        JobHandle { job_id, stop, join }
    }
}

impl Default for ConversionRunner {
    fn default() -> Self {
        Self::new()
    }
}

pub struct JobHandle {
    pub job_id: String,
    stop: Arc<AtomicBool>,
    join: tokio::task::JoinHandle<ConversionJob>,
}

impl JobHandle {
    /// Request a cooperative stop. The runner observes the flag before the
    /// next file and on the next output line of a running process.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Wait for the job to finish and take back the job record, with its
    /// terminal status and timestamps filled in.
    pub async fn wait(self) -> Result<ConversionJob> {
        self.join
            .await
            .map_err(|e| AppError::Conversion(format!("Job task failed: {}", e)))
    }
}

/// Output path for one input: `<custom>_<n>.<ext>` (1-based) when a custom
/// base name is set, `<input stem>_converted.<ext>` otherwise.
pub fn output_path(settings: &ConversionSettings, input: &Path, index: usize) -> PathBuf {
    let base = match &settings.custom_name {
        Some(name) if !name.is_empty() => format!("{}_{}", name, index + 1),
        _ => {
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "output".to_string());
            format!("{}_converted", stem)
        }
    };
    let file_name = sanitize_filename(&format!("{}.{}", base, settings.format.extension()));
    settings.output_folder.join(file_name)
}

async fn run_job(
    job: &ConversionJob,
    stems: Option<Arc<dyn StemSeparator>>,
    events: &UnboundedSender<ConversionEvent>,
    stop: &AtomicBool,
) -> JobOutcome {
    for (index, input) in job.input_files.iter().enumerate() {
        if stop.load(Ordering::SeqCst) {
            let _ = events.send(ConversionEvent::Log("Conversion stopped by user".to_string()));
            return JobOutcome::Stopped;
        }

        let output = output_path(&job.settings, input, index);
        let genre_hint = enhance::genre_from_path(input);
        let filter_chain = enhance::filter_chain(&job.settings.enhancement, genre_hint);
        let args = build_ffmpeg_args(
            input,
            &output,
            job.settings.format,
            job.settings.quality,
            filter_chain.as_deref(),
            job.settings.keep_metadata,
        );

        let _ = events.send(ConversionEvent::FileStarted {
            index,
            input: input.clone(),
        });
        let _ = events.send(ConversionEvent::Log(format!(
            "Running: {} {}",
            job.settings.ffmpeg_path.display(),
            args.join(" ")
        )));

        match convert_one(&job.settings.ffmpeg_path, &args, index, events, stop).await {
            Ok(FileRun::Stopped) => {
                let _ = events.send(ConversionEvent::Log("Conversion stopped by user".to_string()));
                return JobOutcome::Stopped;
            }
            Ok(FileRun::Completed) => {}
            Err(e) => {
                log::error!("Conversion failed for {}: {}", input.display(), e);
                return JobOutcome::Failed {
                    file: input.clone(),
                    message: e.to_string(),
                };
            }
        }

        if job.settings.separate_stems {
            separate_stems(&stems, &output, &job.settings.output_folder, events).await;
        }

        let _ = events.send(ConversionEvent::FileCompleted { index, output });
    }

    JobOutcome::Completed
}

enum FileRun {
    Completed,
    Stopped,
}

/// Run one ffmpeg invocation, streaming its diagnostic output. ffmpeg
/// writes both the duration banner and the `time=` markers to stderr, so
/// stdout is discarded.
async fn convert_one(
    ffmpeg: &Path,
    args: &[String],
    index: usize,
    events: &UnboundedSender<ConversionEvent>,
    stop: &AtomicBool,
) -> Result<FileRun> {
    let mut child = Command::new(ffmpeg)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| AppError::FfmpegSubprocess(format!("Failed to start ffmpeg: {}", e)))?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::FfmpegSubprocess("ffmpeg stderr was not captured".to_string()))?;
    let mut lines = BufReader::new(stderr).lines();
    let mut parser = ProgressParser::new();

    while let Some(line) = lines.next_line().await? {
        if stop.load(Ordering::SeqCst) {
            if let Err(e) = child.start_kill() {
                log::warn!("Failed to kill ffmpeg: {}", e);
            }
            let _ = child.wait().await;
            return Ok(FileRun::Stopped);
        }

        if let Some(update) = parser.parse_line(&line) {
            let _ = events.send(ConversionEvent::Progress {
                index,
                percent: update.percent,
            });
        }
        let _ = events.send(ConversionEvent::Log(line));
    }

    let status = child.wait().await?;
    if !status.success() {
        return Err(AppError::FfmpegSubprocess(format!(
            "ffmpeg exited with {}",
            status
        )));
    }

    Ok(FileRun::Completed)
}

/// Optional post-step. Failure is logged and reported but never aborts the
/// job; an absent or unavailable separator degrades silently.
async fn separate_stems(
    stems: &Option<Arc<dyn StemSeparator>>,
    output: &Path,
    out_dir: &Path,
    events: &UnboundedSender<ConversionEvent>,
) {
    match stems {
        Some(separator) if separator.is_available() => {
            let _ = events.send(ConversionEvent::Log(format!(
                "Separating stems with {}...",
                separator.name()
            )));
            match separator.separate(output, out_dir).await {
                Ok(()) => {
                    let _ = events.send(ConversionEvent::Log("Stems saved.".to_string()));
                }
                Err(e) => {
                    log::warn!("Stem separation failed: {}", e);
                    let _ = events.send(ConversionEvent::Log(format!(
                        "Stem separation failed: {}",
                        e
                    )));
                }
            }
        }
        Some(separator) => {
            let _ = events.send(ConversionEvent::Log(format!(
                "{} not available, skipping stem separation",
                separator.name()
            )));
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{OutputFormat, QualityTier};
    use tokio::sync::mpsc::unbounded_channel;

    fn settings(ffmpeg: PathBuf, out: PathBuf) -> ConversionSettings {
        ConversionSettings {
            ffmpeg_path: ffmpeg,
            output_folder: out,
            format: OutputFormat::Mp3,
            quality: QualityTier::High,
            enhancement: "None".to_string(),
            custom_name: None,
            keep_metadata: false,
            separate_stems: false,
        }
    }

    #[test]
    fn output_path_default_naming() {
        let s = settings(PathBuf::from("ffmpeg"), PathBuf::from("/out"));
        let path = output_path(&s, Path::new("/in/track.wav"), 0);
        assert_eq!(path, PathBuf::from("/out/track_converted.mp3"));
    }

    #[test]
    fn output_path_custom_naming_is_one_based() {
        let mut s = settings(PathBuf::from("ffmpeg"), PathBuf::from("/out"));
        s.custom_name = Some("album".to_string());
        assert_eq!(
            output_path(&s, Path::new("/in/a.wav"), 0),
            PathBuf::from("/out/album_1.mp3")
        );
        assert_eq!(
            output_path(&s, Path::new("/in/b.wav"), 4),
            PathBuf::from("/out/album_5.mp3")
        );
    }

    #[test]
    fn output_path_sanitizes_custom_name() {
        let mut s = settings(PathBuf::from("ffmpeg"), PathBuf::from("/out"));
        s.custom_name = Some("my*mix".to_string());
        assert_eq!(
            output_path(&s, Path::new("/in/a.wav"), 0),
            PathBuf::from("/out/my_mix_1.mp3")
        );
    }

    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, script_body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", script_body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    async fn collect_events(
        mut rx: tokio::sync::mpsc::UnboundedReceiver<ConversionEvent>,
    ) -> Vec<ConversionEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let done = matches!(event, ConversionEvent::Finished(_));
            events.push(event);
            if done {
                break;
            }
        }
        events
    }

    #[tokio::test]
    async fn stop_before_start_spawns_nothing() {
        let (tx, rx) = unbounded_channel();
        // A nonexistent ffmpeg path would fail the job if anything spawned.
        let s = settings(PathBuf::from("/nonexistent/ffmpeg"), PathBuf::from("/out"));
        let job = ConversionJob::new(vec![PathBuf::from("/in/a.wav")], s);
        let id = job.id.clone();

        let handle = ConversionRunner::new().spawn(job, tx);
        assert_eq!(handle.job_id, id);
        handle.stop();
        let finished = handle.wait().await.unwrap();
        assert_eq!(finished.id, id);
        assert_eq!(finished.status, JobStatus::Stopped);

        let events = collect_events(rx).await;
        assert!(!events
            .iter()
            .any(|e| matches!(e, ConversionEvent::FileStarted { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, ConversionEvent::Finished(JobOutcome::Stopped))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_first_file_aborts_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), "echo 'broken input' >&2; exit 1");
        let s = settings(ffmpeg, dir.path().to_path_buf());
        let first = PathBuf::from("/in/first.wav");
        let job = ConversionJob::new(vec![first.clone(), PathBuf::from("/in/second.wav")], s);

        let (tx, rx) = unbounded_channel();
        let finished = ConversionRunner::new().spawn(job, tx).wait().await.unwrap();
        assert_eq!(finished.status, JobStatus::Failed);

        let events = collect_events(rx).await;
        match events.last() {
            Some(ConversionEvent::Finished(JobOutcome::Failed { file, .. })) => {
                assert_eq!(*file, first)
            }
            other => panic!("expected failure, got {:?}", other),
        }
        let started: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                ConversionEvent::FileStarted { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec![0], "second file must never be attempted");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_run_reports_progress_and_completion() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(
            dir.path(),
            concat!(
                "echo '  Duration: 00:02:30.00, start: 0.000000' >&2\n",
                "echo 'size=1024kB time=00:01:15.00 bitrate=320kbits/s' >&2\n",
                "echo 'size=2048kB time=00:02:30.00 bitrate=320kbits/s' >&2\n",
                "exit 0"
            ),
        );
        let s = settings(ffmpeg, dir.path().to_path_buf());
        let job = ConversionJob::new(vec![PathBuf::from("/in/a.wav")], s);

        let (tx, rx) = unbounded_channel();
        let finished = ConversionRunner::new().spawn(job, tx).wait().await.unwrap();
        assert_eq!(finished.status, JobStatus::Completed);
        assert!(finished.started_at.is_some());
        assert!(finished.completed_at.is_some());
        assert!(finished.started_at <= finished.completed_at);

        let events = collect_events(rx).await;
        let percents: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                ConversionEvent::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![50, 100]);
        assert!(events
            .iter()
            .any(|e| matches!(e, ConversionEvent::FileCompleted { index: 0, .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stop_mid_file_kills_the_process_and_yields_stopped() {
        let dir = tempfile::tempdir().unwrap();
        // Keeps emitting status lines so the per-line stop check fires;
        // would exit 0 (and complete the file) if left to run out.
        let ffmpeg = fake_ffmpeg(
            dir.path(),
            concat!(
                "echo '  Duration: 00:10:00.00, start: 0.000000' >&2\n",
                "i=0\n",
                "while [ $i -lt 100 ]; do\n",
                "  echo \"size=${i}kB time=00:00:01.00 bitrate=320kbits/s\" >&2\n",
                "  i=$((i+1))\n",
                "  sleep 0.1\n",
                "done\n",
                "exit 0"
            ),
        );
        let s = settings(ffmpeg, dir.path().to_path_buf());
        let job = ConversionJob::new(vec![PathBuf::from("/in/a.wav")], s);

        let (tx, mut rx) = unbounded_channel();
        let handle = ConversionRunner::new().spawn(job, tx);

        // Let the subprocess produce at least one line before stopping.
        while let Some(event) = rx.recv().await {
            if matches!(event, ConversionEvent::Log(_)) {
                break;
            }
        }
        handle.stop();

        let finished = handle.wait().await.unwrap();
        assert_eq!(finished.status, JobStatus::Stopped);

        let mut outcome = None;
        let mut saw_completed = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                ConversionEvent::FileCompleted { .. } => saw_completed = true,
                ConversionEvent::Finished(o) => outcome = Some(o),
                _ => {}
            }
        }
        assert_eq!(outcome, Some(JobOutcome::Stopped));
        assert!(!saw_completed, "a stopped file must not be reported done");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stem_separation_failure_does_not_abort_the_job() {
        struct FailingSeparator;

        #[async_trait::async_trait]
        impl StemSeparator for FailingSeparator {
            fn is_available(&self) -> bool {
                true
            }
            async fn separate(&self, _input: &Path, _out_dir: &Path) -> Result<()> {
                Err(AppError::StemSeparation("model missing".to_string()))
            }
            fn name(&self) -> &str {
                "failing"
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), "exit 0");
        let mut s = settings(ffmpeg, dir.path().to_path_buf());
        s.separate_stems = true;
        let job = ConversionJob::new(vec![PathBuf::from("/in/a.wav")], s);

        let (tx, rx) = unbounded_channel();
        let runner = ConversionRunner::new().with_stem_separator(Arc::new(FailingSeparator));
        let finished = runner.spawn(job, tx).wait().await.unwrap();
        assert_eq!(finished.status, JobStatus::Completed);

        let events = collect_events(rx).await;
        assert!(events.iter().any(|e| matches!(
            e,
            ConversionEvent::Log(line) if line.contains("Stem separation failed")
        )));
    }
}

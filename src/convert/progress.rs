//! Parsing of ffmpeg's diagnostic stream.
//!
//! Two line shapes matter: the one-time `Duration: HH:MM:SS.ss` startup
//! banner and the repeated `time=HH:MM:SS.ss` status markers. Progress is
//! only reported once the duration is known.

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    pub current_secs: f64,
    pub total_secs: f64,
    pub percent: u8,
}

pub struct ProgressParser {
    duration_re: Regex,
    time_re: Regex,
    duration_secs: Option<f64>,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self {
            duration_re: Regex::new(r"Duration:\s*(\d+):(\d+):(\d+\.\d+)")
                .expect("hard-coded pattern"),
            time_re: Regex::new(r"time=(\d+):(\d+):(\d+\.\d+)").expect("hard-coded pattern"),
            duration_secs: None,
        }
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.duration_secs
    }

    /// Feed one output line. Returns an update only for `time=` markers seen
    /// after a duration > 0 has been parsed.
    pub fn parse_line(&mut self, line: &str) -> Option<ProgressUpdate> {
        if self.duration_secs.is_none() && line.contains("Duration") {
            if let Some(caps) = self.duration_re.captures(line) {
                self.duration_secs = hms_to_secs(&caps);
            }
            return None;
        }

        let total = self.duration_secs.filter(|d| *d > 0.0)?;
        if !line.contains("time=") {
            return None;
        }
        let caps = self.time_re.captures(line)?;
        let current = hms_to_secs(&caps)?;
        let percent = ((current / total) * 100.0).floor().clamp(0.0, 100.0) as u8;
        Some(ProgressUpdate {
            current_secs: current,
            total_secs: total,
            percent,
        })
    }
}

impl Default for ProgressParser {
    fn default() -> Self {
        Self::new()
    }
}

fn hms_to_secs(caps: &regex::Captures<'_>) -> Option<f64> {
    let h: f64 = caps.get(1)?.as_str().parse().ok()?;
    let m: f64 = caps.get(2)?.as_str().parse().ok()?;
    let s: f64 = caps.get(3)?.as_str().parse().ok()?;
    Some(h * 3600.0 + m * 60.0 + s)
}

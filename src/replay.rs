//! What we know about a replay OBS just saved

use crate::{config::Clips, log_warn};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// OBS's default replay file name format, e.g. `Replay_2025-04-06_18-05-52.mp4`
const FILE_NAME_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
/// External helper commands should not hold up a clip announcement.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
const UNKNOWN_WINDOW: &str = "Unknown";

#[derive(Debug, Clone)]
pub struct ReplayEvent {
    pub path: PathBuf,
    pub file_name: String,
    /// Parsed from the file name.  `None` if the name doesn't follow OBS's format.
    pub captured_at: Option<DateTime<Local>>,
    pub size_mb: f64,
    pub active_window: String,
}

impl ReplayEvent {
    /// Gather metadata for a freshly saved replay.
    pub async fn capture(saved_path: PathBuf, clips: &Clips) -> Result<Self> {
        let path = remuxed_path(saved_path, clips.remux);

        if !clips.sound_effect_command.is_empty() {
            // Fire and forget; the sound is feedback for the person clipping, not part of the
            // announcement.
            let cmd = clips.sound_effect_command.clone();
            tokio::spawn(async move {
                if let Err(e) = run_command(&cmd).await {
                    log_warn!("Could not play sound effect: {}", e);
                }
            });
        }

        let active_window = active_window(&clips.active_window_command).await;
        let size_mb = file_size_mb(&path).await?;

        Ok(Self::new(path, size_mb, active_window))
    }

    pub fn new(path: PathBuf, size_mb: f64, active_window: String) -> Self {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let captured_at = parse_capture_time(&file_name);

        Self {
            path,
            file_name,
            captured_at,
            size_mb,
            active_window,
        }
    }
}

/// OBS writes an mkv first and, with automatic remuxing enabled, an mp4 next to it.
pub fn remuxed_path(path: PathBuf, remux: bool) -> PathBuf {
    let is_mkv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mkv"));

    if remux && is_mkv {
        path.with_extension("mp4")
    } else {
        path
    }
}

/// Local time encoded in an OBS replay file name.
pub fn parse_capture_time(file_name: &str) -> Option<DateTime<Local>> {
    let stem = file_name.split('.').next()?;
    let (_prefix, time) = stem.split_once('_')?;
    let naive = NaiveDateTime::parse_from_str(time, FILE_NAME_TIME_FORMAT).ok()?;
    Local.from_local_datetime(&naive).earliest()
}

/// Size in megabytes, rounded to two decimals.
pub async fn file_size_mb(path: &Path) -> Result<f64> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| anyhow!("Could not stat `{}`: {}", path.to_string_lossy(), e))?;

    Ok(megabytes(metadata.len()))
}

pub fn megabytes(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}

async fn active_window(cmd: &[String]) -> String {
    if cmd.is_empty() {
        return UNKNOWN_WINDOW.to_owned();
    }

    match run_command(cmd).await {
        Ok(stdout) if !stdout.trim().is_empty() => stdout.trim().to_owned(),
        Ok(_) => UNKNOWN_WINDOW.to_owned(),
        Err(e) => {
            log_warn!("Could not determine active window: {}", e);
            UNKNOWN_WINDOW.to_owned()
        }
    }
}

async fn run_command(cmd: &[String]) -> Result<String> {
    let (program, args) = cmd.split_first().ok_or(anyhow!("Empty command"))?;

    let output = tokio::time::timeout(
        COMMAND_TIMEOUT,
        tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| anyhow!("`{}` timed out", program))?
    .map_err(|e| anyhow!("Could not run `{}`: {}", program, e))?;

    if !output.status.success() {
        return Err(anyhow!("`{}` exited with {}", program, output.status));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use std::io::Write;

    fn clips(dir: &Path) -> Clips {
        Clips {
            path: dir.to_path_buf(),
            channel_id: serenity::all::ChannelId::new(1),
            remux: false,
            attach_on_session_end: false,
            sound_effect_command: Vec::new(),
            active_window_command: Vec::new(),
        }
    }

    #[test]
    fn parses_obs_file_name() {
        let time = parse_capture_time("Replay_2025-04-06_18-05-52.mp4").unwrap();
        assert_eq!((time.year(), time.month(), time.day()), (2025, 4, 6));
        assert_eq!((time.hour(), time.minute(), time.second()), (18, 5, 52));
    }

    #[test]
    fn rejects_unexpected_file_names() {
        assert!(parse_capture_time("clip.mp4").is_none());
        assert!(parse_capture_time("Replay_yesterday.mp4").is_none());
        assert!(parse_capture_time("").is_none());
    }

    #[test]
    fn remux_swaps_mkv_only() {
        let mkv = PathBuf::from("/clips/Replay_2025-04-06_18-05-52.mkv");
        assert_eq!(
            remuxed_path(mkv.clone(), true),
            PathBuf::from("/clips/Replay_2025-04-06_18-05-52.mp4")
        );
        assert_eq!(remuxed_path(mkv.clone(), false), mkv);

        let mp4 = PathBuf::from("/clips/Replay_2025-04-06_18-05-52.mp4");
        assert_eq!(remuxed_path(mp4.clone(), true), mp4);
    }

    #[test]
    fn megabytes_rounds_to_two_places() {
        assert_eq!(megabytes(0), 0.0);
        assert_eq!(megabytes(1024 * 1024), 1.0);
        assert_eq!(megabytes(1024 * 1024 * 3 / 2), 1.5);
        assert_eq!(megabytes(12_345_678), 11.77);
    }

    #[tokio::test]
    async fn capture_reads_size_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Replay_2025-04-06_18-05-52.mp4");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&vec![0u8; 1024 * 1024 * 2]).unwrap();

        let event = ReplayEvent::capture(path.clone(), &clips(dir.path()))
            .await
            .unwrap();
        assert_eq!(event.path, path);
        assert_eq!(event.file_name, "Replay_2025-04-06_18-05-52.mp4");
        assert_eq!(event.size_mb, 2.0);
        assert_eq!(event.active_window, UNKNOWN_WINDOW);
        assert!(event.captured_at.is_some());
    }

    #[tokio::test]
    async fn capture_fails_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Replay_2025-04-06_18-05-52.mkv");
        assert!(ReplayEvent::capture(path, &clips(dir.path())).await.is_err());
    }
}

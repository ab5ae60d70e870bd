//! Per-episode monitor journaling (spec.md §4.E, §6).

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use serde::Serialize;

#[derive(Serialize)]
struct Header<'a> {
    t_start: f64,
    gym_version: &'a str,
    env_id: &'a str,
}

#[derive(Serialize)]
struct EpisodeRecord {
    r: f32,
    l: i32,
    t: f64,
}

/// Writes `<dir>/<cpu:03>.monitor.json`. A failure to open the file
/// disables journaling for this worker without failing the run (§7).
pub struct Monitor {
    file: Option<File>,
    started: Instant,
}

impl Monitor {
    pub fn open(monitor_dir: &str, cpu: usize, env_id: &str, wall_clock_t_start: f64) -> Self {
        if monitor_dir.is_empty() {
            return Monitor { file: None, started: Instant::now() };
        }
        let path = Path::new(monitor_dir).join(format!("{cpu:03}.monitor.json"));
        match File::create(&path) {
            Ok(mut f) => {
                let header = Header { t_start: wall_clock_t_start, gym_version: "vecgym", env_id };
                if let Err(e) = Self::write_line(&mut f, &header) {
                    log::warn!("cpu{cpu:02}: failed to write monitor header to {path:?}: {e}");
                    return Monitor { file: None, started: Instant::now() };
                }
                log::info!("cpu{cpu:02}: monitor journal at {path:?}");
                Monitor { file: Some(f), started: Instant::now() }
            }
            Err(e) => {
                log::warn!("cpu{cpu:02}: cannot open monitor file {path:?}: {e}; journaling disabled");
                Monitor { file: None, started: Instant::now() }
            }
        }
    }

    fn write_line<T: Serialize>(file: &mut File, value: &T) -> std::io::Result<()> {
        let mut line = serde_json::to_string(value).expect("monitor records always serialize");
        line.push('\n');
        file.write_all(line.as_bytes())?;
        file.flush()
    }

    /// Emit one record for a just-finished episode (spec.md §4.D step 9).
    pub fn record_episode(&mut self, score: f32, frame: i32) {
        let Some(file) = self.file.as_mut() else { return };
        let record = EpisodeRecord { r: score, l: frame, t: self.started.elapsed().as_secs_f64() };
        if let Err(e) = Self::write_line(file, &record) {
            log::warn!("monitor write failed, disabling journaling: {e}");
            self.file = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;

    #[test]
    fn writes_header_then_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = Monitor::open(dir.path().to_str().unwrap(), 7, "TestEnv-v0", 100.0);
        m.record_episode(3.5, 42);
        m.record_episode(-1.0, 10);

        let path = dir.path().join("007.monitor.json");
        let lines: Vec<String> = std::io::BufReader::new(File::open(path).unwrap())
            .lines()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("\"env_id\":\"TestEnv-v0\""));
        assert!(lines[1].contains("\"r\":3.5"));
        assert!(lines[2].contains("\"l\":10"));
    }

    #[test]
    fn disabled_when_dir_is_empty() {
        let mut m = Monitor::open("", 0, "x", 0.0);
        m.record_episode(1.0, 1); // must not panic
    }
}

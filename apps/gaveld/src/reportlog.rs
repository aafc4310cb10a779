//! Moderation files on disk: per-modcall area reports and the rolling audit
//! log. These are small, synchronous writes guarded by one lock.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;
use chrono::Utc;
use tracing::error;

#[derive(Debug)]
pub struct ReportLog {
    dir: PathBuf,
    file_lock: Mutex<()>,
}

impl ReportLog {
    pub fn new(dir: PathBuf) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        Ok(Self {
            dir,
            file_lock: Mutex::new(()),
        })
    }

    /// Flush an area buffer to a timestamped report file and return its name.
    pub fn write_report(&self, area_name: &str, buffer: &[String]) -> Option<String> {
        let name = format!(
            "report-{}-{}.log",
            Utc::now().format("%Y-%m-%dT%H%M%SZ"),
            sanitize(area_name)
        );
        let path = self.dir.join(&name);
        let _guard = self.file_lock.lock().expect("report lock poisoned");
        if let Err(e) = std::fs::write(&path, buffer.join("\n")) {
            error!(path = %path.display(), err = %e, "failed to write report");
            return None;
        }
        Some(name)
    }

    /// Append one line to the server-wide audit log.
    pub fn write_audit(&self, line: &str) {
        let path = self.dir.join("audit.log");
        let _guard = self.file_lock.lock().expect("report lock poisoned");
        let res = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| writeln!(f, "{line}"));
        if let Err(e) = res {
            error!(path = %path.display(), err = %e, "failed to write audit log");
        }
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_report_and_audit() {
        let dir = tempfile::tempdir().unwrap();
        let log = ReportLog::new(dir.path().to_path_buf()).unwrap();

        let name = log
            .write_report("Courtroom 1", &["a".to_string(), "b".to_string()])
            .unwrap();
        assert!(name.starts_with("report-"));
        assert!(name.ends_with("Courtroom_1.log"));
        let contents = std::fs::read_to_string(dir.path().join(&name)).unwrap();
        assert_eq!(contents, "a\nb");

        log.write_audit("first");
        log.write_audit("second");
        let audit = std::fs::read_to_string(dir.path().join("audit.log")).unwrap();
        assert_eq!(audit, "first\nsecond\n");
    }
}

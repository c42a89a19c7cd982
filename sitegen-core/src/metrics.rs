use std::io::Write;
use std::path::Path;
use std::time::Duration;

use chrono::Local;
use walkdir::WalkDir;

/// Total size in bytes of the regular files under `dir`.
pub fn output_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Append `<timestamp>,<seconds>,<bytes>` to the build metrics log.
pub fn append_build_metrics(log: &Path, elapsed: Duration, output_dir: &Path) -> std::io::Result<()> {
    let line = format!(
        "{},{:.2},{}\n",
        Local::now().format("%Y-%m-%dT%H:%M:%S%.6f"),
        elapsed.as_secs_f64(),
        output_size(output_dir)
    );

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log)?;
    file.write_all(line.as_bytes())
}

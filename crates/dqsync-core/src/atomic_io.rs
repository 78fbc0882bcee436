use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tempfile::NamedTempFile;

/// Persists `content` at `path` through a sibling temp file, so a crashed run
/// leaves either the previous report or the new one.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    let Some(file_name) = path.file_name() else {
        bail!("report path '{}' has no file name", path.display());
    };
    if path.is_dir() {
        bail!("report path '{}' is a directory", path.display());
    }
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create report directory {}", dir.display()))?;

    let mut staged = tempfile::Builder::new()
        .prefix(file_name)
        .suffix(".partial")
        .tempfile_in(dir)
        .with_context(|| format!("failed to stage report in {}", dir.display()))?;
    stage_contents(&mut staged, content)
        .with_context(|| format!("failed to write staged report {}", staged.path().display()))?;
    staged
        .persist(path)
        .map_err(|error| error.error)
        .with_context(|| format!("failed to move staged report to {}", path.display()))?;
    Ok(())
}

fn stage_contents(staged: &mut NamedTempFile, content: &str) -> std::io::Result<()> {
    staged.write_all(content.as_bytes())?;
    staged.as_file().sync_all()
}

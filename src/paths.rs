use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub fn self_path() -> Result<PathBuf> {
    Ok(std::env::current_exe().context("current_exe")?)
}

/// Directory the package is expected in: always the directory containing the
/// running executable, never the working directory.
pub fn package_dir() -> Result<PathBuf> {
    let exe = self_path()?;
    Ok(exe.parent().context("exe has no parent")?.to_path_buf())
}

pub fn resolve_package_path(package_dir: &Path, file_name: &str) -> PathBuf {
    package_dir.join(file_name)
}

/// Attribute-query existence check: every failure, including access denied,
/// reads as missing. The only decision downstream is install or report.
pub fn file_exists(path: &Path) -> bool {
    std::fs::metadata(path).is_ok()
}

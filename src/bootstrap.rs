use crate::config;
use crate::msi::{self, InstallerApi, ServiceVersionProbe, INSTALLUILEVEL_FULL, MINIMUM_SERVICE_VERSION};
use crate::paths;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Everything that stops the hand-off to the installer service. Each variant
/// carries the exact copy shown in the error dialog.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SetupError {
    #[error("Windows Installer was not found. Install Windows Installer and run setup again.")]
    InstallerUnavailable,
    #[error("The name of the installation package could not be determined.")]
    PackageUnresolved,
    #[error("A file required for installation was not found.\n{}", .0.display())]
    PackageMissing(PathBuf),
    #[error("The functions in msi.dll could not be loaded.")]
    BindingFailed,
}

pub fn run() -> Result<(), SetupError> {
    run_with_deps(
        msi::probe_service,
        paths::package_dir,
        config::package_file_name,
        paths::file_exists,
        dispatch_install,
    )
}

/// The whole decision sequence with every collaborator injected. Each closure
/// runs at most once, and nothing past the first failed check runs at all.
pub(crate) fn run_with_deps(
    probe: impl FnOnce() -> ServiceVersionProbe,
    package_dir: impl FnOnce() -> anyhow::Result<PathBuf>,
    package_file: impl FnOnce() -> Option<String>,
    exists: impl FnOnce(&Path) -> bool,
    dispatch: impl FnOnce(&Path) -> Result<(), SetupError>,
) -> Result<(), SetupError> {
    if !probe().meets(MINIMUM_SERVICE_VERSION) {
        return Err(SetupError::InstallerUnavailable);
    }

    let dir = package_dir().map_err(|_| SetupError::PackageUnresolved)?;
    let file_name = package_file().ok_or(SetupError::PackageUnresolved)?;
    let package = paths::resolve_package_path(&dir, &file_name);

    if !exists(&package) {
        return Err(SetupError::PackageMissing(package));
    }

    dispatch(&package)
}

fn dispatch_install(package: &Path) -> Result<(), SetupError> {
    dispatch_with(&InstallerApi::bind(), package)
}

/// Hands the package to the installer service at full UI. Return codes of the
/// two calls are not inspected: once the package is handed over, the service
/// reports its own outcome through its own interface.
pub(crate) fn dispatch_with(api: &InstallerApi, package: &Path) -> Result<(), SetupError> {
    if api.has_error() {
        return Err(SetupError::BindingFailed);
    }

    let _ = api.set_internal_ui(INSTALLUILEVEL_FULL);
    let _ = api.install_product(package, "");
    Ok(())
}

#![cfg_attr(windows, windows_subsystem = "windows")]

mod bootstrap;
mod config;
mod dialog;
mod msi;
mod paths;

fn main() {
    // Failures end in a dialog, never in a nonzero exit code: the installer
    // service owns the outcome once the package has been handed over.
    if let Err(err) = bootstrap::run() {
        dialog::report_error(&err.to_string());
    }
}

include!(concat!(env!("OUT_DIR"), "/bootstrap_config.rs"));

/// Name of the package this binary was paired with at build time, or `None`
/// when the build configuration left it blank.
pub fn package_file_name() -> Option<String> {
    non_empty(PACKAGE_FILE)
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

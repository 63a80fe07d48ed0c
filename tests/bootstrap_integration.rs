#[path = "../src/bootstrap.rs"]
mod bootstrap;
#[path = "../src/config.rs"]
mod config;
#[path = "../src/msi.rs"]
mod msi;
#[path = "../src/paths.rs"]
mod paths;

use bootstrap::SetupError;
use msi::{InstallerApi, RawEntryPoint, ServiceVersionProbe, INSTALLUILEVEL_FULL, MINIMUM_SERVICE_VERSION};
use std::path::Path;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Mutex;

type SetInternalUiFn = unsafe extern "system" fn(i32, *mut isize) -> i32;
type InstallProductFn = unsafe extern "system" fn(*const u16, *const u16) -> u32;

unsafe extern "system" fn idle_entry() -> isize {
    0
}

unsafe fn read_wide(mut ptr: *const u16) -> String {
    let mut units = Vec::new();
    while *ptr != 0 {
        units.push(*ptr);
        ptr = ptr.add(1);
    }
    String::from_utf16_lossy(&units)
}

fn current_service() -> ServiceVersionProbe {
    ServiceVersionProbe {
        loaded: true,
        version: MINIMUM_SERVICE_VERSION,
    }
}

static SET_UI_CALLS: AtomicUsize = AtomicUsize::new(0);
static SET_UI_LEVEL: AtomicI32 = AtomicI32::new(-1);
static INSTALL_CALLS: AtomicUsize = AtomicUsize::new(0);
static INSTALL_ARGS: Mutex<Option<(String, String)>> = Mutex::new(None);

unsafe extern "system" fn record_set_internal_ui(ui_level: i32, _window: *mut isize) -> i32 {
    SET_UI_CALLS.fetch_add(1, Ordering::SeqCst);
    SET_UI_LEVEL.store(ui_level, Ordering::SeqCst);
    0
}

unsafe extern "system" fn record_install_product(package: *const u16, command_line: *const u16) -> u32 {
    INSTALL_CALLS.fetch_add(1, Ordering::SeqCst);
    let args = (read_wide(package), read_wide(command_line));
    if let Ok(mut slot) = INSTALL_ARGS.lock() {
        *slot = Some(args);
    }
    0
}

fn recording_api() -> InstallerApi {
    InstallerApi::bind_entries(|symbol| match symbol {
        "MsiSetInternalUI" => Some(unsafe {
            std::mem::transmute::<SetInternalUiFn, RawEntryPoint>(record_set_internal_ui)
        }),
        "MsiInstallProductW" => Some(unsafe {
            std::mem::transmute::<InstallProductFn, RawEntryPoint>(record_install_product)
        }),
        _ => Some(idle_entry as RawEntryPoint),
    })
}

#[test]
fn present_package_is_handed_to_the_service_at_full_ui() {
    let dir = tempfile::tempdir().unwrap();
    let package = dir.path().join("setup.msi");
    std::fs::write(&package, b"msi package").unwrap();

    let api = recording_api();
    let dir_path = dir.path().to_path_buf();
    let result = bootstrap::run_with_deps(
        current_service,
        move || Ok(dir_path),
        || Some("setup.msi".to_string()),
        paths::file_exists,
        |package: &Path| bootstrap::dispatch_with(&api, package),
    );

    assert_eq!(result, Ok(()));
    assert_eq!(SET_UI_CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(SET_UI_LEVEL.load(Ordering::SeqCst), INSTALLUILEVEL_FULL);
    assert_eq!(INSTALL_CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(
        *INSTALL_ARGS.lock().unwrap(),
        Some((package.to_string_lossy().into_owned(), String::new())),
    );
}

#[test]
fn absent_service_stops_everything_else() {
    let result = bootstrap::run_with_deps(
        ServiceVersionProbe::absent,
        || unreachable!("package dir resolved"),
        || unreachable!("package name read"),
        |_: &Path| unreachable!("existence checked"),
        |_: &Path| unreachable!("install dispatched"),
    );

    assert_eq!(result, Err(SetupError::InstallerUnavailable));
    assert_eq!(
        result.unwrap_err().to_string(),
        "Windows Installer was not found. Install Windows Installer and run setup again.",
    );
}

#[test]
fn missing_package_is_reported_with_its_full_path() {
    let dir = tempfile::tempdir().unwrap();
    let expected = dir.path().join("setup.msi");

    let dir_path = dir.path().to_path_buf();
    let result = bootstrap::run_with_deps(
        current_service,
        move || Ok(dir_path),
        || Some("setup.msi".to_string()),
        paths::file_exists,
        |_: &Path| unreachable!("install dispatched"),
    );

    let error = result.unwrap_err();
    assert_eq!(error, SetupError::PackageMissing(expected.clone()));
    let message = error.to_string();
    assert!(message.starts_with("A file required for installation was not found."));
    assert!(message.contains(&expected.display().to_string()));
}

static STRAY_SET_UI_CALLS: AtomicUsize = AtomicUsize::new(0);
static STRAY_INSTALL_CALLS: AtomicUsize = AtomicUsize::new(0);

unsafe extern "system" fn stray_set_internal_ui(_ui_level: i32, _window: *mut isize) -> i32 {
    STRAY_SET_UI_CALLS.fetch_add(1, Ordering::SeqCst);
    0
}

unsafe extern "system" fn stray_install_product(_package: *const u16, _command_line: *const u16) -> u32 {
    STRAY_INSTALL_CALLS.fetch_add(1, Ordering::SeqCst);
    0
}

#[test]
fn one_missing_symbol_blocks_every_call() {
    let api = InstallerApi::bind_entries(|symbol| match symbol {
        "MsiApplyPatchW" => None,
        "MsiSetInternalUI" => Some(unsafe {
            std::mem::transmute::<SetInternalUiFn, RawEntryPoint>(stray_set_internal_ui)
        }),
        "MsiInstallProductW" => Some(unsafe {
            std::mem::transmute::<InstallProductFn, RawEntryPoint>(stray_install_product)
        }),
        _ => Some(idle_entry as RawEntryPoint),
    });

    let result = bootstrap::dispatch_with(&api, Path::new("/opt/setup/setup.msi"));

    assert_eq!(result, Err(SetupError::BindingFailed));
    assert_eq!(STRAY_SET_UI_CALLS.load(Ordering::SeqCst), 0);
    assert_eq!(STRAY_INSTALL_CALLS.load(Ordering::SeqCst), 0);
}

static FAILING_INSTALL_CALLS: AtomicUsize = AtomicUsize::new(0);

unsafe extern "system" fn quiet_set_internal_ui(_ui_level: i32, _window: *mut isize) -> i32 {
    0
}

unsafe extern "system" fn failing_install_product(_package: *const u16, _command_line: *const u16) -> u32 {
    FAILING_INSTALL_CALLS.fetch_add(1, Ordering::SeqCst);
    1603
}

#[test]
fn install_result_codes_are_not_inspected() {
    let api = InstallerApi::bind_entries(|symbol| match symbol {
        "MsiSetInternalUI" => Some(unsafe {
            std::mem::transmute::<SetInternalUiFn, RawEntryPoint>(quiet_set_internal_ui)
        }),
        "MsiInstallProductW" => Some(unsafe {
            std::mem::transmute::<InstallProductFn, RawEntryPoint>(failing_install_product)
        }),
        _ => Some(idle_entry as RawEntryPoint),
    });

    let result = bootstrap::dispatch_with(&api, Path::new("/opt/setup/setup.msi"));

    assert_eq!(result, Ok(()));
    assert_eq!(FAILING_INSTALL_CALLS.load(Ordering::SeqCst), 1);
}

#[cfg(not(windows))]
#[test]
fn run_reports_unavailable_service_off_windows() {
    assert_eq!(bootstrap::run(), Err(SetupError::InstallerUnavailable));
}

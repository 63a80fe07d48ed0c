use std::{collections::HashMap, iter::once, path::Path};

/// Library holding the installer service entry points. Loaded by name so the
/// normal system search order applies.
pub const SERVICE_LIBRARY: &str = "msi.dll";

/// Oldest installer service this stub will hand a package to, as the
/// major/minor half of a file version number (2.0).
pub const MINIMUM_SERVICE_VERSION: u32 = 0x0002_0000;

/// Suffix selecting the wide-character variant of an exported symbol.
const SYMBOL_TEXT_SUFFIX: &str = "W";

/// Full user interface during installation.
pub const INSTALLUILEVEL_FULL: i32 = 5;

/// Persist mode opening an installer database read-only.
#[allow(dead_code)]
pub const MSIDBOPEN_READONLY: isize = 0;

#[allow(dead_code)]
pub type MsiHandle = u32;

pub(crate) fn to_wide(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(once(0)).collect()
}

/// Shape of an exported symbol before it is cast to its real signature.
pub type RawEntryPoint = unsafe extern "system" fn() -> isize;

type SetInternalUiFn = unsafe extern "system" fn(i32, *mut isize) -> i32;
type InstallProductFn = unsafe extern "system" fn(*const u16, *const u16) -> u32;
type ApplyPatchFn = unsafe extern "system" fn(*const u16, *const u16, i32, *const u16) -> u32;
type ReinstallProductFn = unsafe extern "system" fn(*const u16, u32) -> u32;
type QueryProductStateFn = unsafe extern "system" fn(*const u16) -> i32;
type OpenDatabaseFn = unsafe extern "system" fn(*const u16, *const u16, *mut u32) -> u32;
type DatabaseOpenViewFn = unsafe extern "system" fn(u32, *const u16, *mut u32) -> u32;
type ViewExecuteFn = unsafe extern "system" fn(u32, u32) -> u32;
type ViewFetchFn = unsafe extern "system" fn(u32, *mut u32) -> u32;
type RecordGetStringFn = unsafe extern "system" fn(u32, u32, *mut u16, *mut u32) -> u32;
type CloseHandleFn = unsafe extern "system" fn(u32) -> u32;

struct EntryPointSpec {
    logical: &'static str,
    symbol: &'static str,
    text_variant: bool,
}

impl EntryPointSpec {
    fn symbol_name(&self) -> String {
        if self.text_variant {
            format!("{}{SYMBOL_TEXT_SUFFIX}", self.symbol)
        } else {
            self.symbol.to_string()
        }
    }
}

// Handle-only exports have no text variant and keep their undecorated names.
const ENTRY_POINTS: [EntryPointSpec; 11] = [
    EntryPointSpec { logical: "set_internal_ui", symbol: "MsiSetInternalUI", text_variant: false },
    EntryPointSpec { logical: "install_product", symbol: "MsiInstallProduct", text_variant: true },
    EntryPointSpec { logical: "apply_patch", symbol: "MsiApplyPatch", text_variant: true },
    EntryPointSpec { logical: "reinstall_product", symbol: "MsiReinstallProduct", text_variant: true },
    EntryPointSpec { logical: "query_product_state", symbol: "MsiQueryProductState", text_variant: true },
    EntryPointSpec { logical: "open_database", symbol: "MsiOpenDatabase", text_variant: true },
    EntryPointSpec { logical: "database_open_view", symbol: "MsiDatabaseOpenView", text_variant: true },
    EntryPointSpec { logical: "view_execute", symbol: "MsiViewExecute", text_variant: false },
    EntryPointSpec { logical: "view_fetch", symbol: "MsiViewFetch", text_variant: false },
    EntryPointSpec { logical: "record_get_string", symbol: "MsiRecordGetString", text_variant: true },
    EntryPointSpec { logical: "close_handle", symbol: "MsiCloseHandle", text_variant: false },
];

/// Outcome of probing the installed service: whether its library loaded at
/// all, and the version read off the library file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceVersionProbe {
    pub loaded: bool,
    pub version: u32,
}

impl ServiceVersionProbe {
    pub fn absent() -> Self {
        Self {
            loaded: false,
            version: 0,
        }
    }

    /// A service that never loaded fails every minimum, whatever its file
    /// version claims.
    pub fn meets(&self, minimum: u32) -> bool {
        self.loaded && self.version >= minimum
    }
}

/// Checks the service library in the system directory: a trial load first,
/// then the version stamped on the file. The trial handle is released before
/// the version is read.
#[cfg(windows)]
pub fn probe_service() -> ServiceVersionProbe {
    let Some(system_dir) = system_directory() else {
        return ServiceVersionProbe::absent();
    };
    let path = system_dir.join(SERVICE_LIBRARY);
    if ServiceLibrary::open(&path.to_string_lossy()).is_none() {
        return ServiceVersionProbe::absent();
    }
    ServiceVersionProbe {
        loaded: true,
        version: file_version_ms(&path, 0),
    }
}

#[cfg(not(windows))]
pub fn probe_service() -> ServiceVersionProbe {
    ServiceVersionProbe::absent()
}

#[cfg(windows)]
fn system_directory() -> Option<std::path::PathBuf> {
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;
    use windows_sys::Win32::Foundation::MAX_PATH;
    use windows_sys::Win32::System::SystemInformation::GetSystemDirectoryW;

    let mut buffer = [0u16; MAX_PATH as usize + 1];
    let len = unsafe { GetSystemDirectoryW(buffer.as_mut_ptr(), buffer.len() as u32) };
    if len == 0 || len > MAX_PATH {
        return None;
    }
    Some(OsString::from_wide(&buffer[..len as usize]).into())
}

/// Major/minor half of the file version resource, or `fallback` when the
/// resource is missing or malformed.
#[cfg(windows)]
fn file_version_ms(path: &Path, fallback: u32) -> u32 {
    use windows_sys::Win32::Storage::FileSystem::{
        GetFileVersionInfoSizeW, GetFileVersionInfoW, VerQueryValueW, VS_FIXEDFILEINFO,
    };

    let wide = to_wide(&path.to_string_lossy());
    let mut handle = 0u32;
    let size = unsafe { GetFileVersionInfoSizeW(wide.as_ptr(), &mut handle) };
    if size == 0 {
        return fallback;
    }

    let mut data = vec![0u8; size as usize];
    let copied = unsafe { GetFileVersionInfoW(wide.as_ptr(), 0, size, data.as_mut_ptr().cast()) };
    if copied == 0 {
        return fallback;
    }

    let root = to_wide("\\");
    let mut value: *mut core::ffi::c_void = std::ptr::null_mut();
    let mut value_len = 0u32;
    let found =
        unsafe { VerQueryValueW(data.as_ptr().cast(), root.as_ptr(), &mut value, &mut value_len) };
    if found == 0
        || value.is_null()
        || (value_len as usize) < std::mem::size_of::<VS_FIXEDFILEINFO>()
    {
        return fallback;
    }

    let info = value.cast::<VS_FIXEDFILEINFO>();
    unsafe { (*info).dwFileVersionMS }
}

/// Owned handle to a loaded library, released on drop.
#[cfg(windows)]
pub(crate) struct ServiceLibrary {
    handle: isize,
}

#[cfg(windows)]
impl ServiceLibrary {
    pub(crate) fn open(name: &str) -> Option<Self> {
        use windows_sys::Win32::System::LibraryLoader::LoadLibraryW;

        let wide = to_wide(name);
        let handle = unsafe { LoadLibraryW(wide.as_ptr()) };
        (handle != 0).then_some(Self { handle })
    }

    pub(crate) fn entry_point(&self, symbol: &str) -> Option<RawEntryPoint> {
        use windows_sys::Win32::System::LibraryLoader::GetProcAddress;

        let name: Vec<u8> = symbol.bytes().chain(once(0)).collect();
        unsafe { GetProcAddress(self.handle, name.as_ptr()) }
    }
}

#[cfg(windows)]
impl Drop for ServiceLibrary {
    fn drop(&mut self) {
        use windows_sys::Win32::System::LibraryLoader::FreeLibrary;

        unsafe {
            FreeLibrary(self.handle);
        }
    }
}

#[cfg(not(windows))]
pub(crate) struct ServiceLibrary;

#[cfg(not(windows))]
impl ServiceLibrary {
    pub(crate) fn open(_name: &str) -> Option<Self> {
        None
    }

    pub(crate) fn entry_point(&self, _symbol: &str) -> Option<RawEntryPoint> {
        None
    }
}

fn resolve_entry_points(
    mut lookup: impl FnMut(&str) -> Option<RawEntryPoint>,
) -> (HashMap<&'static str, RawEntryPoint>, bool) {
    let mut bindings = HashMap::with_capacity(ENTRY_POINTS.len());
    let mut missing = false;
    for spec in &ENTRY_POINTS {
        match lookup(&spec.symbol_name()) {
            Some(entry) => {
                bindings.insert(spec.logical, entry);
            }
            // One unresolved symbol poisons the whole binding. Resolution
            // still visits the rest so the result is not order dependent.
            None => missing = true,
        }
    }
    (bindings, missing)
}

/// All installer entry points, resolved up front. `has_error` must be checked
/// before any call is dispatched.
pub struct InstallerApi {
    _library: Option<ServiceLibrary>,
    bindings: HashMap<&'static str, RawEntryPoint>,
    load_failed: bool,
    binding_failed: bool,
}

impl InstallerApi {
    pub fn bind() -> Self {
        match ServiceLibrary::open(SERVICE_LIBRARY) {
            Some(library) => {
                let (bindings, binding_failed) =
                    resolve_entry_points(|symbol| library.entry_point(symbol));
                Self {
                    _library: Some(library),
                    bindings,
                    load_failed: false,
                    binding_failed,
                }
            }
            None => Self::unavailable(),
        }
    }

    pub(crate) fn bind_entries(lookup: impl FnMut(&str) -> Option<RawEntryPoint>) -> Self {
        let (bindings, binding_failed) = resolve_entry_points(lookup);
        Self {
            _library: None,
            bindings,
            load_failed: false,
            binding_failed,
        }
    }

    /// A library that never loaded: no symbols are looked up at all.
    pub(crate) fn unavailable() -> Self {
        Self {
            _library: None,
            bindings: HashMap::new(),
            load_failed: true,
            binding_failed: false,
        }
    }

    pub fn has_error(&self) -> bool {
        self.load_failed || self.binding_failed
    }

    /// Panics when `logical` never resolved; `has_error` gates every caller.
    fn binding(&self, logical: &str) -> RawEntryPoint {
        self.bindings[logical]
    }

    pub fn set_internal_ui(&self, ui_level: i32) -> i32 {
        let set_internal_ui: SetInternalUiFn =
            unsafe { std::mem::transmute(self.binding("set_internal_ui")) };
        unsafe { set_internal_ui(ui_level, std::ptr::null_mut()) }
    }

    pub fn install_product(&self, package: &Path, command_line: &str) -> u32 {
        let package_wide = to_wide(&package.to_string_lossy());
        let command_wide = to_wide(command_line);
        let install_product: InstallProductFn =
            unsafe { std::mem::transmute(self.binding("install_product")) };
        unsafe { install_product(package_wide.as_ptr(), command_wide.as_ptr()) }
    }
}

/// Bindings beyond the install hand-off. Resolved with the rest so a broken
/// library is caught up front, and kept callable for servicing flows.
#[allow(dead_code)]
impl InstallerApi {
    pub fn apply_patch(
        &self,
        patch_package: &Path,
        install_package: Option<&Path>,
        install_type: i32,
        command_line: &str,
    ) -> u32 {
        let patch_wide = to_wide(&patch_package.to_string_lossy());
        let install_wide = install_package.map(|path| to_wide(&path.to_string_lossy()));
        let command_wide = to_wide(command_line);
        let apply_patch: ApplyPatchFn = unsafe { std::mem::transmute(self.binding("apply_patch")) };
        unsafe {
            apply_patch(
                patch_wide.as_ptr(),
                install_wide
                    .as_ref()
                    .map_or(std::ptr::null(), |wide| wide.as_ptr()),
                install_type,
                command_wide.as_ptr(),
            )
        }
    }

    pub fn reinstall_product(&self, product_code: &str, reinstall_mode: u32) -> u32 {
        let product_wide = to_wide(product_code);
        let reinstall_product: ReinstallProductFn =
            unsafe { std::mem::transmute(self.binding("reinstall_product")) };
        unsafe { reinstall_product(product_wide.as_ptr(), reinstall_mode) }
    }

    pub fn query_product_state(&self, product_code: &str) -> i32 {
        let product_wide = to_wide(product_code);
        let query_product_state: QueryProductStateFn =
            unsafe { std::mem::transmute(self.binding("query_product_state")) };
        unsafe { query_product_state(product_wide.as_ptr()) }
    }

    /// `persist` is either a path cast from [`MSIDBOPEN_READONLY`] and its
    /// sibling modes, or a pointer to a path string; the raw form keeps both
    /// callable.
    pub fn open_database(&self, database_path: &Path, persist: isize, handle: &mut MsiHandle) -> u32 {
        let path_wide = to_wide(&database_path.to_string_lossy());
        let open_database: OpenDatabaseFn =
            unsafe { std::mem::transmute(self.binding("open_database")) };
        unsafe { open_database(path_wide.as_ptr(), persist as *const u16, handle) }
    }

    pub fn database_open_view(&self, database: MsiHandle, query: &str, view: &mut MsiHandle) -> u32 {
        let query_wide = to_wide(query);
        let database_open_view: DatabaseOpenViewFn =
            unsafe { std::mem::transmute(self.binding("database_open_view")) };
        unsafe { database_open_view(database, query_wide.as_ptr(), view) }
    }

    pub fn view_execute(&self, view: MsiHandle, parameters: MsiHandle) -> u32 {
        let view_execute: ViewExecuteFn =
            unsafe { std::mem::transmute(self.binding("view_execute")) };
        unsafe { view_execute(view, parameters) }
    }

    pub fn view_fetch(&self, view: MsiHandle, record: &mut MsiHandle) -> u32 {
        let view_fetch: ViewFetchFn = unsafe { std::mem::transmute(self.binding("view_fetch")) };
        unsafe { view_fetch(view, record) }
    }

    pub fn record_get_string(
        &self,
        record: MsiHandle,
        field: u32,
        value: &mut [u16],
        value_len: &mut u32,
    ) -> u32 {
        let record_get_string: RecordGetStringFn =
            unsafe { std::mem::transmute(self.binding("record_get_string")) };
        unsafe { record_get_string(record, field, value.as_mut_ptr(), value_len) }
    }

    pub fn close_handle(&self, handle: MsiHandle) -> u32 {
        let close_handle: CloseHandleFn =
            unsafe { std::mem::transmute(self.binding("close_handle")) };
        unsafe { close_handle(handle) }
    }
}

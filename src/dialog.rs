use crate::config;

const FALLBACK_TITLE: &str = "Setup";

fn title_for(product_name: &str) -> String {
    let name = product_name.trim();
    if name.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        format!("{name} Setup")
    }
}

/// Modal error dialog. Blocks until dismissed so the message is never lost
/// behind the process exiting.
#[cfg(windows)]
pub fn report_error(message: &str) {
    use std::iter::once;
    use windows_sys::Win32::UI::WindowsAndMessaging::{MessageBoxW, MB_OK};

    let text: Vec<u16> = message.encode_utf16().chain(once(0)).collect();
    let caption: Vec<u16> = title_for(config::PRODUCT_NAME)
        .encode_utf16()
        .chain(once(0))
        .collect();
    unsafe {
        MessageBoxW(0, text.as_ptr(), caption.as_ptr(), MB_OK);
    }
}

#[cfg(not(windows))]
pub fn report_error(message: &str) {
    eprintln!("{}: {message}", title_for(config::PRODUCT_NAME));
}

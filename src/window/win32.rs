//! Raw Win32 window enumeration: the low-level fallback backend and the
//! diagnostic listing of every visible top-level window.

use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;

use windows::Win32::Foundation::{BOOL, HWND, LPARAM, TRUE};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetWindowTextLengthW, GetWindowTextW, IsWindowVisible,
};

/// Reads a window title, empty when the window has none.
pub fn window_title(hwnd: HWND) -> String {
    unsafe {
        let len = GetWindowTextLengthW(hwnd);
        if len <= 0 {
            return String::new();
        }
        let mut buf: Vec<u16> = vec![0; (len + 1) as usize];
        let copied = GetWindowTextW(hwnd, &mut buf);
        if copied <= 0 {
            return String::new();
        }
        OsString::from_wide(&buf[..copied as usize])
            .to_string_lossy()
            .to_string()
    }
}

/// Finds the first visible top-level window whose title contains the
/// keyword. Returns the handle and the full title.
pub fn find_window_by_title(keyword: &str) -> Option<(HWND, String)> {
    struct EnumData {
        keyword: String,
        found: Option<(HWND, String)>,
    }

    unsafe extern "system" fn enum_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
        unsafe {
            let data = &mut *(lparam.0 as *mut EnumData);

            if !IsWindowVisible(hwnd).as_bool() {
                return TRUE;
            }
            let title = window_title(hwnd);
            if title.is_empty() {
                return TRUE;
            }
            if title.contains(&data.keyword) {
                data.found = Some((hwnd, title));
                return BOOL(0); // Stop enumeration
            }
            TRUE
        }
    }

    let mut data = EnumData {
        keyword: keyword.to_string(),
        found: None,
    };
    unsafe {
        // EnumWindows returns FALSE when the callback stops it early,
        // which is expected here, not an error.
        let _ = EnumWindows(Some(enum_callback), LPARAM(&mut data as *mut _ as isize));
    }
    data.found
}

/// Lists the titles of every visible top-level window, for operator
/// diagnosis when the target window cannot be found.
pub fn list_window_titles() -> Vec<String> {
    unsafe extern "system" fn enum_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
        unsafe {
            let titles = &mut *(lparam.0 as *mut Vec<String>);
            if IsWindowVisible(hwnd).as_bool() {
                let title = window_title(hwnd);
                if !title.trim().is_empty() {
                    titles.push(title);
                }
            }
            TRUE
        }
    }

    let mut titles: Vec<String> = Vec::new();
    unsafe {
        let _ = EnumWindows(Some(enum_callback), LPARAM(&mut titles as *mut _ as isize));
    }
    titles
}

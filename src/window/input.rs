//! Mouse input for the click-based interaction fallbacks.
//!
//! Two click methods, escalating in intrusiveness:
//! - PostMessage: sends button messages straight to the target window;
//!   invisible to the operator but ignored by some control classes.
//! - SendInput: hardware-level input that moves the real cursor; works
//!   everywhere but interferes with a human at the machine, so callers
//!   gate it behind the mouse-activity check.

use std::time::Duration;

use windows::Win32::Foundation::{HWND, LPARAM, POINT, WPARAM};
use windows::Win32::Graphics::Gdi::ScreenToClient;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_LEFTDOWN,
    MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MOVE, MOUSEINPUT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetCursorPos, GetSystemMetrics, PostMessageW, SetForegroundWindow, SM_CXSCREEN, SM_CYSCREEN,
    WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MOUSEMOVE,
};

/// Samples the cursor twice, 0.3s apart. Movement in between means a
/// human is driving the mouse and synthetic clicks should be deferred
/// this cycle. Deliberately blocks; non-interference beats latency here.
pub fn is_mouse_active() -> bool {
    unsafe {
        let mut before = POINT::default();
        if GetCursorPos(&mut before).is_err() {
            return false;
        }
        std::thread::sleep(Duration::from_millis(300));
        let mut after = POINT::default();
        if GetCursorPos(&mut after).is_err() {
            return false;
        }
        before.x != after.x || before.y != after.y
    }
}

/// Synthetic click: posts button messages to the window owning the
/// element, at the given screen point. Does not move the cursor.
pub fn post_click(hwnd: HWND, screen_x: i32, screen_y: i32) -> bool {
    if hwnd.is_invalid() {
        return false;
    }
    let mut point = POINT {
        x: screen_x,
        y: screen_y,
    };
    unsafe {
        if !ScreenToClient(hwnd, &mut point).as_bool() {
            return false;
        }
        let lparam = LPARAM((((point.y as u32) << 16) | (point.x as u32 & 0xFFFF)) as isize);

        if PostMessageW(hwnd, WM_MOUSEMOVE, WPARAM(0), lparam).is_err() {
            return false;
        }
        std::thread::sleep(Duration::from_millis(50));
        // MK_LBUTTON
        if PostMessageW(hwnd, WM_LBUTTONDOWN, WPARAM(0x0001), lparam).is_err() {
            return false;
        }
        std::thread::sleep(Duration::from_millis(50));
        PostMessageW(hwnd, WM_LBUTTONUP, WPARAM(0), lparam).is_ok()
    }
}

/// Input-simulated click at a screen point. Moves the real cursor; the
/// last resort when both Invoke and PostMessage are ignored.
pub fn send_input_click(foreground: HWND, screen_x: i32, screen_y: i32) -> bool {
    unsafe {
        if !foreground.is_invalid() {
            let _ = SetForegroundWindow(foreground);
            std::thread::sleep(Duration::from_millis(100));
        }

        let screen_width = GetSystemMetrics(SM_CXSCREEN);
        let screen_height = GetSystemMetrics(SM_CYSCREEN);
        if screen_width <= 0 || screen_height <= 0 {
            return false;
        }

        // Normalize to the 0-65535 range MOUSEEVENTF_ABSOLUTE requires
        let norm_x = ((screen_x as i64 * 65535) / screen_width as i64) as i32;
        let norm_y = ((screen_y as i64 * 65535) / screen_height as i64) as i32;

        let mut sent = 0;
        for flags in [
            MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE,
            MOUSEEVENTF_LEFTDOWN | MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_MOVE,
            MOUSEEVENTF_LEFTUP | MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_MOVE,
        ] {
            let input = INPUT {
                r#type: INPUT_MOUSE,
                Anonymous: INPUT_0 {
                    mi: MOUSEINPUT {
                        dx: norm_x,
                        dy: norm_y,
                        dwFlags: flags,
                        ..Default::default()
                    },
                },
            };
            sent += SendInput(&[input], std::mem::size_of::<INPUT>() as i32);
            std::thread::sleep(Duration::from_millis(50));
        }
        sent == 3
    }
}

//! Window resolution: find the POS main window, reject and dismiss the
//! startup alert that masquerades under a similar title, and keep a
//! handle health-checkable across the process lifetime.

use std::time::Duration;

use windows::Win32::Foundation::HWND;
use windows::Win32::UI::Accessibility::IUIAutomationElement;
use windows::Win32::UI::WindowsAndMessaging::{IsIconic, IsWindow, ShowWindow, SW_RESTORE};

use super::input;
use super::uia::{self, UiaContext};
use super::win32;
use crate::log;

/// Title of the application-family alert window.
const POPUP_TITLE: &str = "MATE POS";
/// Marker phrase that identifies the startup alert ("is running").
const POPUP_MARKER: &str = "실행 중입니다";
/// Label of the alert's confirmation button.
const POPUP_CONFIRM: &str = "확인";
/// The alert has almost no descendant text; the main window has dozens.
const POPUP_MAX_TEXTS: usize = 6;

/// A resolved reference to the POS main window.
#[derive(Debug, Clone)]
pub struct PosWindow {
    pub hwnd: HWND,
    pub title: String,
    pub backend: &'static str,
}

/// One way of locating a top-level window by title keyword. Failure of a
/// provider is not an error; only exhaustion of all providers is.
trait WindowProvider {
    fn name(&self) -> &'static str;
    fn find(&self, keyword: &str) -> Option<(HWND, String)>;
}

/// Accessibility-tree backend, tried first.
struct UiaProvider<'a> {
    ctx: &'a UiaContext,
}

impl WindowProvider for UiaProvider<'_> {
    fn name(&self) -> &'static str {
        "uia"
    }
    fn find(&self, keyword: &str) -> Option<(HWND, String)> {
        self.ctx.find_top_level(keyword)
    }
}

/// Raw EnumWindows backend, for windows the UIA tree does not expose.
struct Win32Provider;

impl WindowProvider for Win32Provider {
    fn name(&self) -> &'static str {
        "win32"
    }
    fn find(&self, keyword: &str) -> Option<(HWND, String)> {
        win32::find_window_by_title(keyword)
    }
}

/// Resolves the POS main window by title keyword, trying every backend in
/// priority order. A candidate that turns out to be the startup alert is
/// dismissed and that backend retried once. On total failure, logs every
/// visible window title for the operator and returns `None`.
pub fn resolve(ctx: &UiaContext, keyword: &str) -> Option<PosWindow> {
    let providers: [&dyn WindowProvider; 2] = [&UiaProvider { ctx }, &Win32Provider];

    for provider in providers {
        for _attempt in 0..2 {
            let Some((hwnd, title)) = provider.find(keyword) else {
                break;
            };
            if is_startup_popup(ctx, hwnd) {
                log("Candidate window is the MATE POS startup alert, dismissing");
                dismiss_popup_window(ctx, hwnd);
                continue;
            }
            log(&format!(
                "POS window connected: \"{}\" ({})",
                title,
                provider.name()
            ));
            return Some(PosWindow {
                hwnd,
                title,
                backend: provider.name(),
            });
        }
    }

    log(&format!("Window matching \"{}\" not found. Visible windows:", keyword));
    for title in win32::list_window_titles() {
        log(&format!("  - {}", title));
    }
    None
}

/// Cheap liveness probe: the handle still names a window that answers a
/// title query. Any failure means "not alive".
pub fn is_alive(window: &PosWindow) -> bool {
    unsafe {
        if !IsWindow(window.hwnd).as_bool() {
            return false;
        }
    }
    !win32::window_title(window.hwnd).is_empty()
}

/// Restores the window if minimized. Returns whether a restore happened.
pub fn ensure_visible(window: &PosWindow) -> bool {
    unsafe {
        if !IsIconic(window.hwnd).as_bool() {
            return false;
        }
        let _ = ShowWindow(window.hwnd, SW_RESTORE);
    }
    std::thread::sleep(Duration::from_millis(500));
    log("Restored minimized POS window");
    true
}

/// Looks for the startup alert by its own title and dismisses it if
/// present. Called before resolution attempts; harmless when absent.
pub fn dismiss_startup_popup(ctx: &UiaContext) {
    let Some((hwnd, _title)) = win32::find_window_by_title(POPUP_TITLE) else {
        return;
    };
    if is_startup_popup(ctx, hwnd) {
        log("Dismissing MATE POS startup alert");
        dismiss_popup_window(ctx, hwnd);
    }
}

/// The alert carries the marker phrase and an unusually small descendant
/// text count; the real main window matches neither.
fn is_startup_popup(ctx: &UiaContext, hwnd: HWND) -> bool {
    let texts = ctx.read_all_text(hwnd);
    let descendant_texts = texts.len().saturating_sub(1);
    texts.iter().any(|t| t.contains(POPUP_MARKER)) && descendant_texts < POPUP_MAX_TEXTS
}

fn dismiss_popup_window(ctx: &UiaContext, hwnd: HWND) {
    let Some(button) = ctx.find_by_name(hwnd, POPUP_CONFIRM) else {
        log("Startup alert has no confirmation button, leaving it alone");
        return;
    };
    if activate_element(&button) {
        std::thread::sleep(Duration::from_secs(1));
    } else {
        log("Failed to activate the alert confirmation button");
    }
}

/// Activates a control through escalating interaction methods:
/// programmatic Invoke, then a posted synthetic click, then a real
/// input-simulated click.
pub fn activate_element(element: &IUIAutomationElement) -> bool {
    if uia::try_invoke(element) {
        return true;
    }

    let Some((owner, rect)) = uia::element_geometry(element) else {
        return false;
    };
    let center_x = (rect.left + rect.right) / 2;
    let center_y = (rect.top + rect.bottom) / 2;

    if input::post_click(owner, center_x, center_y) {
        return true;
    }
    input::send_input_click(owner, center_x, center_y)
}

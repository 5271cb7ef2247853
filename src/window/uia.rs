//! UI Automation backend: the accessibility-tree path for both window
//! discovery and structured text reading.
//!
//! Foreign UI trees are not guaranteed stable mid-read, so every query is
//! optional-returning: an element that throws is skipped, never aborting
//! the read.

use anyhow::Result;
use windows::core::Interface;
use windows::Win32::Foundation::{HWND, RECT};
use windows::Win32::System::Com::{CoCreateInstance, CLSCTX_INPROC_SERVER};
use windows::Win32::UI::Accessibility::{
    CUIAutomation, IUIAutomation, IUIAutomationElement, IUIAutomationInvokePattern,
    TreeScope_Children, TreeScope_Descendants, UIA_InvokePatternId,
};

use super::win32;

pub struct UiaContext {
    automation: IUIAutomation,
}

impl UiaContext {
    /// Requires COM to be initialized on this thread (RoInitialize in main).
    pub fn new() -> Result<Self> {
        let automation: IUIAutomation =
            unsafe { CoCreateInstance(&CUIAutomation, None, CLSCTX_INPROC_SERVER)? };
        Ok(Self { automation })
    }

    /// Finds a visible top-level window whose name contains the keyword.
    pub fn find_top_level(&self, keyword: &str) -> Option<(HWND, String)> {
        let root = unsafe { self.automation.GetRootElement() }.ok()?;
        let condition = unsafe { self.automation.CreateTrueCondition() }.ok()?;
        let children = unsafe { root.FindAll(TreeScope_Children, &condition) }.ok()?;
        let len = unsafe { children.Length() }.ok()?;

        for i in 0..len {
            let Ok(element) = (unsafe { children.GetElement(i) }) else {
                continue;
            };
            let Ok(name) = (unsafe { element.CurrentName() }) else {
                continue;
            };
            let name = name.to_string();
            if !name.contains(keyword) {
                continue;
            }
            if let Ok(hwnd) = unsafe { element.CurrentNativeWindowHandle() } {
                if !hwnd.is_invalid() {
                    return Some((hwnd, name));
                }
            }
        }
        None
    }

    /// All descendant elements of the window, in tree-traversal order.
    fn descendants(&self, hwnd: HWND) -> Vec<IUIAutomationElement> {
        let mut elements = Vec::new();
        let Ok(window) = (unsafe { self.automation.ElementFromHandle(hwnd) }) else {
            return elements;
        };
        let Ok(condition) = (unsafe { self.automation.CreateTrueCondition() }) else {
            return elements;
        };
        let Ok(found) = (unsafe { window.FindAll(TreeScope_Descendants, &condition) }) else {
            return elements;
        };
        let Ok(len) = (unsafe { found.Length() }) else {
            return elements;
        };
        for i in 0..len {
            if let Ok(element) = unsafe { found.GetElement(i) } {
                elements.push(element);
            }
        }
        elements
    }

    /// Window title first, then every descendant control's non-empty
    /// trimmed name in tree order. Controls that fail to answer are
    /// skipped.
    pub fn read_all_text(&self, hwnd: HWND) -> Vec<String> {
        let mut texts = Vec::new();
        let title = win32::window_title(hwnd);
        if !title.trim().is_empty() {
            texts.push(title.trim().to_string());
        }

        for element in self.descendants(hwnd) {
            let Ok(name) = (unsafe { element.CurrentName() }) else {
                continue;
            };
            let name = name.to_string();
            let trimmed = name.trim();
            if !trimmed.is_empty() {
                texts.push(trimmed.to_string());
            }
        }
        texts
    }

    /// First descendant whose name equals `name` exactly.
    pub fn find_by_name(&self, hwnd: HWND, name: &str) -> Option<IUIAutomationElement> {
        self.descendants(hwnd).into_iter().find(|element| {
            unsafe { element.CurrentName() }
                .map(|n| n.to_string() == name)
                .unwrap_or(false)
        })
    }

    /// First descendant with the given automation id.
    pub fn find_by_automation_id(&self, hwnd: HWND, id: &str) -> Option<IUIAutomationElement> {
        self.descendants(hwnd).into_iter().find(|element| {
            unsafe { element.CurrentAutomationId() }
                .map(|n| n.to_string() == id)
                .unwrap_or(false)
        })
    }
}

/// Programmatic activation via the Invoke pattern. The cheapest and least
/// intrusive interaction method; not every control supports it.
pub fn try_invoke(element: &IUIAutomationElement) -> bool {
    let Ok(pattern) = (unsafe { element.GetCurrentPattern(UIA_InvokePatternId) }) else {
        return false;
    };
    let Ok(invoke) = pattern.cast::<IUIAutomationInvokePattern>() else {
        return false;
    };
    unsafe { invoke.Invoke() }.is_ok()
}

/// Screen-space bounding rectangle and owning native window, needed by
/// the click-based interaction fallbacks.
pub fn element_geometry(element: &IUIAutomationElement) -> Option<(HWND, RECT)> {
    let rect = unsafe { element.CurrentBoundingRectangle() }.ok()?;
    if rect.right <= rect.left || rect.bottom <= rect.top {
        return None;
    }
    let hwnd = unsafe { element.CurrentNativeWindowHandle() }.unwrap_or_default();
    Some((hwnd, rect))
}

pub mod input;
pub mod resolver;
pub mod uia;
pub mod win32;

pub use resolver::PosWindow;

use crate::capture;
use crate::errors::MonitorError;
use crate::extract::{self, Evidence};
use crate::log;
use crate::ocr;
use crate::supervisor::PosDriver;
use uia::UiaContext;

/// The production driver: binds the supervisor to the MATE POS window
/// through UI Automation, screen capture, and OCR.
pub struct MateDriver {
    ctx: UiaContext,
    window_keyword: String,
    delivery_tab_id: String,
    tesseract_path: String,
}

impl MateDriver {
    pub fn new(
        ctx: UiaContext,
        window_keyword: &str,
        delivery_tab_id: &str,
        tesseract_path: &str,
    ) -> Self {
        Self {
            ctx,
            window_keyword: window_keyword.to_string(),
            delivery_tab_id: delivery_tab_id.to_string(),
            tesseract_path: tesseract_path.to_string(),
        }
    }
}

impl PosDriver for MateDriver {
    type Handle = PosWindow;

    fn resolve(&mut self) -> Option<PosWindow> {
        resolver::dismiss_startup_popup(&self.ctx);
        resolver::resolve(&self.ctx, &self.window_keyword)
    }

    fn is_alive(&mut self, handle: &PosWindow) -> bool {
        resolver::is_alive(handle)
    }

    fn ensure_visible(&mut self, handle: &PosWindow) -> bool {
        resolver::ensure_visible(handle)
    }

    /// Selects the delivery tab so the counts on screen are the delivery
    /// ones. Skipped whenever someone is using the mouse.
    fn prepare(&mut self, handle: &PosWindow) {
        if input::is_mouse_active() {
            log("Mouse in use, skipping tab selection this cycle");
            return;
        }
        let Some(tab) = self.ctx.find_by_automation_id(handle.hwnd, &self.delivery_tab_id)
        else {
            return;
        };
        if !resolver::activate_element(&tab) {
            log("Delivery tab click failed, reading current view as-is");
        }
    }

    fn read_count(&mut self, handle: &PosWindow) -> Result<Evidence, MonitorError> {
        if !resolver::is_alive(handle) {
            return Err(MonitorError::Acquisition(format!(
                "window '{}' ({}) disappeared before read",
                handle.title, handle.backend
            )));
        }

        // Structured path: every text fragment the accessibility tree
        // exposes, in tree order.
        let fragments = self.ctx.read_all_text(handle.hwnd);
        if let Some(evidence) = extract::extract_from_text(&fragments) {
            return Ok(evidence);
        }

        // Visual fallback.
        let img = capture::capture_window(handle.hwnd)
            .map_err(|e| MonitorError::Capture(e.to_string()))?;
        match ocr::recognize_window(&img, &self.tesseract_path) {
            Some(extraction) => Ok(Evidence {
                count: extraction.count,
                matched: if extraction.active.is_empty() {
                    "ocr: no active rows".to_string()
                } else {
                    format!("ocr: {}", extraction.active.join(", "))
                },
            }),
            None => Err(MonitorError::ExtractionMiss),
        }
    }
}

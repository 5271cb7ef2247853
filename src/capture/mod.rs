pub mod screenshot;

pub use screenshot::capture_window;

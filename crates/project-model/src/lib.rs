//! Shotcraft Project Model
//!
//! Defines the data contracts consumed by the export engine:
//! - **Devices:** Catalogue of target canvases and device-frame specs
//! - **Screens:** Layout, captions, typography, and per-language media assignments
//! - **Project:** The manifest tying screens, devices, and languages together

pub mod color;
pub mod device;
pub mod project;
pub mod screen;

pub use color::*;
pub use device::*;
pub use project::*;
pub use screen::*;

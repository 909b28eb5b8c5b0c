//! Report generation
//!
//! Turns a [`DeviceOverview`](crate::types::DeviceOverview) into text: a
//! plain-language data summary, a prompt for the language model, and a
//! deterministic template report used when no model is available.

mod summary;
mod templates;

pub use summary::{build_data_summary, build_prompt, ReportKind};
pub use templates::template_report;

//! `docfill_core` fills Liquid templates embedded in office
//! documents (`.docx` and `.pptx`) with values from a data row.
//!
//! Template authors write directives such as `{{ name }}` or
//! `{% if premium %}` straight into the document. Word processors split that
//! text into formatting runs and paragraphs, so the engine first puts every
//! directive back together and then renders whole blocks at once.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Template package (.docx / .pptx)
//!   → Template cache (single-flight download per template generation)
//!   → Package reader (zip + XML parts → Document of paragraphs and runs)
//!   → Run consolidator (merges directives split across runs)
//!   → Replay engine (groups paragraphs into blocks by tag depth, renders each)
//!   → Package writer (changed runs written back, other entries copied)
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Loads `docfill.toml` (template, column types, variable
//!   mapping and output settings).
//! - [`cache`]: Generation-aware template cache shared between render
//!   workers.
//! - [`scope`]: Block nesting depth of control tags.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docfill_core::ContextValue;
//! use docfill_core::LiquidEvaluator;
//! use docfill_core::RenderContext;
//! use docfill_core::TemplateFormat;
//! use docfill_core::render_package;
//!
//! let template = std::fs::read("certificate.docx")?;
//! let context = RenderContext::new().with("name", ContextValue::String("Ada".into()));
//! let rendered = render_package(
//! 	&template,
//! 	TemplateFormat::Docx,
//! 	&context,
//! 	&LiquidEvaluator::new(),
//! )?;
//!
//! for warning in &rendered.report.warnings {
//! 	eprintln!("{warning}");
//! }
//! std::fs::write("certificate-ada.docx", rendered.bytes)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use cache::*;
pub use config::*;
pub use consolidate::*;
pub use context::*;
pub use engine::*;
pub use error::*;
pub use model::*;
pub use package::*;
pub use render::*;
pub use source::*;
pub use walker::*;

pub mod cache;
pub mod config;
mod consolidate;
mod context;
mod engine;
#[allow(unused_assignments)]
mod error;
mod model;
mod package;
mod render;
pub mod scope;
pub(crate) mod slides;
mod source;
mod walker;
pub(crate) mod word;
pub(crate) mod xml;

#[cfg(test)]
mod __fixtures;

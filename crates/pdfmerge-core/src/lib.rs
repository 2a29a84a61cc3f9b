//! PDF and image merge primitives
//!
//! This crate turns an ordered list of PDFs and raster images into a single
//! PDF using lopdf:
//! - `ranges`: per-file page selections like "1-3, 5"
//! - `render`: one image per A4 page, aspect-preserving and centered
//! - `merge`: the incremental page-append builder

pub mod error;
pub mod merge;
pub mod ranges;
pub mod render;
pub mod task;

pub use error::PdfMergeError;
pub use merge::{load_pdf, MergeBuilder};
pub use ranges::{parse_optional_ranges, parse_ranges, PageSelection};
pub use render::{fit_to_page, render_image_to_pdf, PagePlacement, A4_HEIGHT, A4_WIDTH};
pub use task::{FileKind, FileOptions, Orientation};


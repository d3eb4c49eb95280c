//! Workflow documents: model, parsing, validation and file naming.
//!
//! A workflow document is an n8n export:
//! - `name`: display name, also the source of the file name
//! - `nodes`: the steps, each with id, name, type and canvas position
//! - `connections`: wiring between nodes (opaque here)

mod parser;
mod slug;
mod types;
mod validator;

pub use parser::{
    discover_workflow_files, parse_document, parse_document_file, render_document, write_document,
};
pub use slug::{slugify, workflow_file_name};
pub use types::*;
pub use validator::{
    validate_document, validate_file, validate_paths, validate_str, FileReport, ValidationReport,
    ValidationSummary,
};

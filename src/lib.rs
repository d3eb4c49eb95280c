//! flowctl - version control and CI/CD for n8n workflow documents
//!
//! flowctl keeps workflows as JSON files in a repository and moves them to
//! and from a running instance through its public REST API.
//!
//! ## Key Features
//!
//! - **Validation**: required fields, node shape, duplicate ids, hardcoded
//!   secrets, webhook path naming, error trigger presence
//! - **Export**: one pretty-printed file per workflow, named by slug
//! - **Deploy**: create when the document has no `id`, update when it does
//! - **Mock server**: in-memory API for exercising all of the above offline
//!
//! ## Example
//!
//! ```json
//! {
//!   "name": "Test Workflow - Ping API",
//!   "nodes": [
//!     {"id": "a1", "name": "Start", "type": "n8n-nodes-base.manualTrigger", "position": [250, 300]},
//!     {"id": "b2", "name": "Ping", "type": "n8n-nodes-base.httpRequest", "position": [450, 300]}
//!   ],
//!   "connections": {"Start": {"main": [[{"node": "Ping", "type": "main", "index": 0}]]}}
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod harness;
pub mod mock;
pub mod sync;
pub mod workflow;

pub use error::{Error, Result};

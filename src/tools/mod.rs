//! Tools module - services the role agents can call
//!
//! Contains the patient lookup, the reference query service, external web
//! search, and the registry that dispatches tool calls to them.

pub mod records;
pub mod reference;
pub mod registry;
pub mod search;

pub use records::{LookupOutcome, PatientRecord, PatientStore};
pub use reference::{ReferenceIndex, ReferenceOutcome, REFERENCE_CITATION};
pub use registry::ToolRegistry;
pub use search::{DuckDuckGoSearch, ExternalSearch, SearchBackend, SearchHit, SEARCH_CITATION};

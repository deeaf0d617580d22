//! Link record storage.
//!
//! The resolver only needs read access ([`ReadLinkStore`]); the admin CLI
//! uses the full [`LinkStore`]. Two backends:
//!
//! - [`MemoryLinkStore`]: process-local, for tests and embedding
//! - [`JsonFileLinkStore`]: a JSON document on disk, rewritten atomically

pub mod error;
pub mod json_file;
pub mod memory;
pub mod seed;
pub mod traits;
pub mod validate;

pub use error::{Result, StoreError};
pub use json_file::JsonFileLinkStore;
pub use memory::MemoryLinkStore;
pub use seed::{example_links, seed_examples, SeedReport};
pub use traits::{LinkStore, ReadLinkStore, UpsertOutcome};
pub use validate::{validate_new_link, validate_slug, LinkValidationError};

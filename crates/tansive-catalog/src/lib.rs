//! Tansive Catalog — the trait boundary and in-memory fake for the
//! out-of-scope catalog object store (C15).
//!
//! The real catalog is a SQL-backed CRUD service for catalogs, variants,
//! skillsets, views, and resources (§1 "Out of scope"). This crate models
//! just enough of its surface — [`store::CatalogStore`] — for the execution
//! core to depend on an interface rather than a database, plus
//! [`store::InMemoryCatalog`], a fake good enough to drive the core in
//! tests and local single-process runs.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod error;
pub mod session_record;
pub mod skillset;
pub mod store;

pub use error::{CatalogError, CatalogResult};
pub use session_record::{SessionRecord, SessionStatusDetail, SessionSummary};
pub use skillset::{ContextSlot, Dependency, RunnerKind, SkillDef, SkillSet, Source};
pub use store::{CatalogStore, InMemoryCatalog};

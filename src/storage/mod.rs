//! Storage layer
//!
//! # Architecture
//!
//! ```text
//! Database (schema, trickle thread)
//!   └─→ Table "hosts"            primary, keyed by record key
//!        ├─→ hosts.values        value hash → key (duplicates)
//!        ├─→ hosts.hits          hit count  → key (duplicates)
//!        ├─→ hosts.groups.hits   group rows only
//!        └─→ hosts.seq           id sequence
//! ```
//!
//! Every table lives in one [`kv::Environment`]. Secondaries are maintained
//! by the engine on every primary write through extractors built from the
//! record field accessors.

pub mod database;
pub mod kv;
pub mod schema;
pub mod table;

pub use database::{Database, IndexMode, TableStats};
pub use schema::{KindFilter, Schema, TableSpec};
pub use table::{IndexDef, RecordIter, Table};

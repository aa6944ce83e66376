// Statstore - record storage engine for web log analytics
// Versioned records, keyed tables with secondary indexes, and a working-set cache

#![warn(rust_2018_idioms)]

pub mod cache;
pub mod codec;
pub mod config;
pub mod record;
pub mod storage;

// Re-exports for convenience
pub use cache::{CacheRecord, RecordCache, TmRange};
pub use config::StoreConfig;
pub use record::{Record, RecordKind, StorageState, Stored, ValueRecord};
pub use storage::{Database, Table};

/// Statstore error types
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Buffer overrun: {needed} bytes at offset {offset} exceed buffer size {len}")]
        OutOfBounds {
            offset: usize,
            needed: usize,
            len: usize,
        },

        #[error("Record size mismatch (record: {record}; size: {decoded}; expected: {expected})")]
        Format {
            record: &'static str,
            decoded: usize,
            expected: usize,
        },

        #[error("Invalid UTF-8 text at offset {offset}")]
        InvalidText { offset: usize },

        #[error("Unsupported record version (record: {record}; version: {found}; supported: {supported})")]
        UnsupportedVersion {
            record: &'static str,
            found: u16,
            supported: u16,
        },

        #[error("Engine error {code}: {message}")]
        Engine { code: i32, message: String },

        #[error("Logic error: {0}")]
        Logic(String),

        #[error("I/O error: {0}")]
        Io(#[from] std::io::Error),

        #[error("Configuration error: {0}")]
        Config(String),
    }

    impl Error {
        pub fn engine(code: i32, message: impl Into<String>) -> Self {
            Error::Engine {
                code,
                message: message.into(),
            }
        }

        pub fn logic(message: impl Into<String>) -> Self {
            Error::Logic(message.into())
        }

        /// Numeric engine code, if this is an engine error
        pub fn code(&self) -> Option<i32> {
            match self {
                Error::Engine { code, .. } => Some(*code),
                _ => None,
            }
        }
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod config;
pub mod decision;
pub mod editor;
pub mod error;
pub mod importer;
pub mod library;
pub mod lock;
pub mod log;
pub mod merge;
pub mod pool;
pub mod prompt;
pub mod source;
pub mod types;

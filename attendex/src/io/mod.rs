//! Persistence
//!

// Re-export
pub use self::codec::CodecError;
pub use self::file::IndexFile;

pub mod codec;
pub mod file;

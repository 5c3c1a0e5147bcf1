#[cfg(feature = "golang")]
pub mod golang;
pub mod indexer;
pub mod severity;

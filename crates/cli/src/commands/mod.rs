pub mod ecosystems;
pub mod inspect;
pub mod scan;
pub mod severity;

pub use ecosystems::*;
pub use inspect::*;
pub use scan::*;
pub use severity::*;

//! 디스크 아카이브 저장소.

pub mod codec;
pub mod inspector;
pub mod layout;
pub mod writer;

pub use inspector::ArchiveInspector;
pub use layout::ArchiveLayout;
pub use writer::{ArchiveWriter, WriteOutcome};

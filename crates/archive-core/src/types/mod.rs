//! 아카이브 전반에서 사용되는 공통 타입.

mod security;

pub use security::*;

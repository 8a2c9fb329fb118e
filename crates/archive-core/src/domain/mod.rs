//! 아카이브 레코드 도메인 모델.

mod kind;
mod records;

pub use kind::*;
pub use records::*;

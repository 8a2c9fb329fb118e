//! # Archive Core
//!
//! 일봉(k-data)/틱 아카이브의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 아카이브 전반에서 사용되는 기본 타입을 제공합니다:
//! - 종목 및 거래소 정의
//! - 일봉 레코드와 틱 레코드
//! - 틱 출처(관측/합성) 판별
//! - 로깅 인프라

pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;

//! 아카이브 도메인의 에러 타입.

use thiserror::Error;

/// 핵심 도메인 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 잘못된 종목 식별자
    #[error("잘못된 종목: {0}")]
    InvalidSecurity(String),

    /// 레코드 파싱 에러
    #[error("파싱 에러: {0}")]
    Parse(String),

}

/// 도메인 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;


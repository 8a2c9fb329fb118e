//! 외부 데이터 소스.
//!
//! - `crawl`: 크롤 엔진 경계와 HTTP 구현
//! - `sina`: 장중 체결 내역 (틱)
//! - `netease`: 일봉

pub mod crawl;
pub mod netease;
pub mod sina;

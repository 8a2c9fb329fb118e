//! 종목 및 거래소 정의.
//!
//! 이 모듈은 아카이브의 기본 키가 되는 종목 관련 타입을 정의합니다:
//! - `Exchange` - 상장 거래소 (상해, 심천)
//! - `Security` - (거래소, 종목코드) 쌍으로 식별되는 종목
//! - `SecurityItem` - 종목 목록 제공자가 돌려주는 종목 메타데이터

use crate::error::{CoreError, CoreResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 상장 거래소.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Exchange {
    /// 상해증권거래소
    #[serde(rename = "SH", alias = "sh")]
    Sh,
    /// 심천증권거래소
    #[serde(rename = "SZ", alias = "sz")]
    Sz,
}

impl Exchange {
    /// 대문자 거래소 코드 (아카이브 경로에 사용).
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Sh => "SH",
            Exchange::Sz => "SZ",
        }
    }

    /// 소문자 거래소 코드 (시나 심볼 형식).
    pub fn as_lower(&self) -> &'static str {
        match self {
            Exchange::Sh => "sh",
            Exchange::Sz => "sz",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SH" => Ok(Exchange::Sh),
            "SZ" => Ok(Exchange::Sz),
            other => Err(CoreError::InvalidSecurity(format!(
                "알 수 없는 거래소: {}",
                other
            ))),
        }
    }
}

/// 거래 가능한 종목.
///
/// 종목은 거래소와 종목코드로 식별되며 상장 이후 변하지 않습니다.
/// 표시 형식은 `SH600000`과 같이 거래소 코드 뒤에 종목코드를 붙인 형태이며,
/// 이 문자열이 아카이브 디렉터리 이름으로 사용됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Security {
    /// 상장 거래소
    pub exchange: Exchange,
    /// 종목코드 (예: 600000)
    pub code: String,
}

impl Security {
    /// 새 종목을 생성합니다.
    pub fn new(exchange: Exchange, code: impl Into<String>) -> Self {
        Self {
            exchange,
            code: code.into().trim().to_string(),
        }
    }

    /// 종목코드를 검증한 뒤 종목을 생성합니다.
    ///
    /// 종목코드는 아카이브 디렉터리 이름이 되므로 숫자만 허용합니다.
    pub fn try_new(exchange: Exchange, code: &str) -> CoreResult<Self> {
        let code = code.trim();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(CoreError::InvalidSecurity(format!("{}{}", exchange, code)));
        }
        Ok(Self::new(exchange, code))
    }

    /// 상해 종목을 생성합니다.
    pub fn sh(code: impl Into<String>) -> Self {
        Self::new(Exchange::Sh, code)
    }

    /// 심천 종목을 생성합니다.
    pub fn sz(code: impl Into<String>) -> Self {
        Self::new(Exchange::Sz, code)
    }

    /// 아카이브 키 (`SH600000`).
    pub fn key(&self) -> String {
        format!("{}{}", self.exchange.as_str(), self.code)
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.exchange, self.code)
    }
}

impl FromStr for Security {
    type Err = CoreError;

    /// `SH600000`, `sh600000` 형식을 파싱합니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() < 3 || !s.is_char_boundary(2) {
            return Err(CoreError::InvalidSecurity(s.to_string()));
        }
        let (exchange, code) = s.split_at(2);
        Self::try_new(exchange.parse()?, code)
    }
}

/// 종목 목록 제공자가 돌려주는 종목 항목.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityItem {
    /// 종목 식별자
    pub security: Security,
    /// 종목명
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// 상장일
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_date: Option<NaiveDate>,
}

impl SecurityItem {
    /// 메타데이터 없이 종목 항목을 생성합니다.
    pub fn new(security: Security) -> Self {
        Self {
            security,
            name: None,
            list_date: None,
        }
    }

    /// 상장일을 설정합니다.
    pub fn with_list_date(mut self, list_date: NaiveDate) -> Self {
        self.list_date = Some(list_date);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_key() {
        let security = Security::sh("600000");
        assert_eq!(security.key(), "SH600000");
        assert_eq!(security.to_string(), "SH600000");
    }

    #[test]
    fn test_security_from_str() {
        let security: Security = "sz000001".parse().unwrap();
        assert_eq!(security.exchange, Exchange::Sz);
        assert_eq!(security.code, "000001");

        assert!("XX600000".parse::<Security>().is_err());
        assert!("SH".parse::<Security>().is_err());
        assert!("SH60A000".parse::<Security>().is_err());
    }

    #[test]
    fn test_try_new_rejects_non_digit_codes() {
        assert_eq!(Security::try_new(Exchange::Sh, " 600000 ").unwrap(), Security::sh("600000"));
        assert!(Security::try_new(Exchange::Sh, "../x").is_err());
        assert!(Security::try_new(Exchange::Sz, "").is_err());
    }

    #[test]
    fn test_security_ordering() {
        let mut securities = vec![Security::sz("000001"), Security::sh("600000")];
        securities.sort();
        assert_eq!(securities[0], Security::sh("600000"));
    }
}

//! 아카이브 레코드 타입.
//!
//! 이 모듈은 디스크에 저장되는 레코드를 정의합니다:
//! - `KBarRecord` - 하루치 OHLCV 일봉
//! - `TickRecord` - 장중 체결 틱
//! - `TickDirection` - 체결 성격 (매수/매도/중립)
//! - `TickProvenance` - 틱 출처 (관측/합성)

use crate::error::CoreError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 하루치 일봉 레코드.
///
/// (종목, 거래일)당 최대 하나만 존재하며 한 번 기록되면 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KBarRecord {
    /// 거래일
    pub date: NaiveDate,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량 (주)
    pub volume: u64,
}

impl KBarRecord {
    /// 새 일봉을 생성합니다.
    pub fn new(
        date: NaiveDate,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: u64,
    ) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// 가격 필드의 후행 0을 제거한 레코드를 반환합니다.
    ///
    /// 같은 값이 소스에 따라 `10.20`, `10.2`로 들어와도 같은 바이트로 기록됩니다.
    pub fn normalized(&self) -> Self {
        Self {
            date: self.date,
            open: self.open.normalize(),
            high: self.high.normalize(),
            low: self.low.normalize(),
            close: self.close.normalize(),
            volume: self.volume,
        }
    }

    /// 거래정지 등으로 실제 체결이 없던 일봉인지 확인합니다.
    pub fn is_suspended(&self) -> bool {
        self.open.is_zero() || self.close.is_zero()
    }
}

/// 체결 성격.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickDirection {
    /// 매수 주도 (买盘)
    Buy,
    /// 매도 주도 (卖盘)
    Sell,
    /// 중립 (中性盘)
    Neutral,
}

impl TickDirection {
    /// 아카이브 CSV에 기록되는 코드.
    pub fn code(&self) -> i8 {
        match self {
            TickDirection::Buy => 1,
            TickDirection::Sell => -1,
            TickDirection::Neutral => 0,
        }
    }

    /// 코드에서 체결 성격을 복원합니다.
    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            1 => Some(TickDirection::Buy),
            -1 => Some(TickDirection::Sell),
            0 => Some(TickDirection::Neutral),
            _ => None,
        }
    }
}

impl fmt::Display for TickDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for TickDirection {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i8>()
            .ok()
            .and_then(Self::from_code)
            .ok_or_else(|| CoreError::Parse(format!("잘못된 체결 방향: {}", s)))
    }
}

/// 장중 체결 틱.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRecord {
    /// 체결 시각
    pub timestamp: NaiveDateTime,
    /// 체결가
    pub price: Decimal,
    /// 체결량 (주)
    pub volume: u64,
    /// 체결 성격
    pub direction: TickDirection,
}

impl TickRecord {
    /// 새 틱을 생성합니다. 가격의 후행 0은 제거됩니다.
    pub fn new(
        timestamp: NaiveDateTime,
        price: Decimal,
        volume: u64,
        direction: TickDirection,
    ) -> Self {
        Self {
            timestamp,
            price: price.normalize(),
            volume,
            direction,
        }
    }

    /// 체결 거래일.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// 합성 틱이 찍히는 장 마감 시각 (15:00:00).
pub fn synthetic_tick_time() -> NaiveTime {
    NaiveTime::from_hms_opt(15, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// 틱 출처.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickProvenance {
    /// 실제 장중 피드에서 관측
    Observed,
    /// 일봉에서 합성
    Synthesized,
}

impl TickProvenance {
    /// 하루치 틱의 출처를 판별합니다.
    ///
    /// 합성 틱은 항상 15:00:00 중립 체결 한 건이라는 고정 패턴을 가집니다.
    pub fn of(rows: &[TickRecord]) -> Self {
        match rows {
            [only]
                if only.timestamp.time() == synthetic_tick_time()
                    && only.direction == TickDirection::Neutral =>
            {
                TickProvenance::Synthesized
            }
            _ => TickProvenance::Observed,
        }
    }
}

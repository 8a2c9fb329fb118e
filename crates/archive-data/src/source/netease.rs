//! 넷이즈(163) 일봉 소스.
//!
//! `chddata.html`은 GBK CSV를 최신 거래일부터 내려줍니다:
//!
//! ```text
//! 日期,股票代码,名称,收盘价,最高价,最低价,开盘价,前收盘,涨跌额,涨跌幅,换手率,成交量,成交金额
//! 2020-01-03,'600000,浦发银行,12.6,12.72,12.48,12.57,12.47,0.13,1.0425,0.1,35994636,454032000.0
//! ```
//!
//! 거래정지일은 가격이 0으로 내려오며 건너뜁니다.

use super::crawl::{JobMeta, WorkItem};
use super::sina::decode_gbk;
use crate::error::{DataError, Result};
use archive_core::{DataKind, Exchange, KBarRecord, Security};
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

const KDATA_URL: &str = "http://quotes.money.163.com/service/chddata.html";

const FIELDS: &str = "TCLOSE;HIGH;LOW;TOPEN;LCLOSE;CHG;PCHG;TURNOVER;VOTURNOVER;VATURNOVER";

/// 일봉 다운로드 URL. 종목코드 앞에 상해는 `0`, 심천은 `1`을 붙입니다.
pub fn kdata_url(security: &Security, start: NaiveDate, end: NaiveDate) -> String {
    let prefix = match security.exchange {
        Exchange::Sh => "0",
        Exchange::Sz => "1",
    };
    format!(
        "{}?code={}{}&start={}&end={}&fields={}",
        KDATA_URL,
        prefix,
        security.code,
        start.format("%Y%m%d"),
        end.format("%Y%m%d"),
        FIELDS
    )
}

/// 일봉 구간 요청 작업 항목.
pub fn kdata_work_item(security: &Security, start: NaiveDate, end: NaiveDate) -> WorkItem {
    WorkItem {
        url: kdata_url(security, start, end),
        headers: vec![(
            "Referer".to_string(),
            "http://quotes.money.163.com/".to_string(),
        )],
        meta: JobMeta {
            security: security.clone(),
            date: None,
            kind: DataKind::KBar,
        },
    }
}

struct Columns {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().trim_start_matches('\u{feff}') == name)
                .ok_or_else(|| DataError::InvalidData(format!("kdata column missing: {}", name)))
        };
        Ok(Self {
            date: find("日期")?,
            open: find("开盘价")?,
            high: find("最高价")?,
            low: find("最低价")?,
            close: find("收盘价")?,
            volume: find("成交量")?,
        })
    }
}

fn price(record: &csv::StringRecord, idx: usize) -> Result<Decimal> {
    let raw = record.get(idx).map(str::trim).unwrap_or_default();
    match raw {
        "" | "None" => Ok(Decimal::ZERO),
        s => Decimal::from_str(s).map_err(|e| DataError::ParseError(format!("{}: {}", s, e))),
    }
}

fn volume(record: &csv::StringRecord, idx: usize) -> Result<u64> {
    let value = price(record, idx)?;
    value
        .trunc()
        .to_u64()
        .ok_or_else(|| DataError::ParseError(format!("bad volume: {}", value)))
}

/// 일봉 CSV 본문을 디코딩합니다.
///
/// 거래일 오름차순, 중복 제거, 거래정지 행 제외. 헤더가 맞지 않으면 오류,
/// 헤더만 있으면 빈 목록입니다.
pub fn decode_kdata_payload(body: &[u8]) -> Result<Vec<KBarRecord>> {
    let text = decode_gbk(body);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns = Columns::locate(reader.headers()?)?;

    let mut bars = Vec::new();
    for record in reader.records() {
        let record = record?;
        let raw_date = record.get(columns.date).map(str::trim).unwrap_or_default();
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
            .map_err(|e| DataError::ParseError(format!("{}: {}", raw_date, e)))?;

        let bar = KBarRecord::new(
            date,
            price(&record, columns.open)?,
            price(&record, columns.high)?,
            price(&record, columns.low)?,
            price(&record, columns.close)?,
            volume(&record, columns.volume)?,
        );
        if bar.is_suspended() {
            continue;
        }
        bars.push(bar);
    }

    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);
    Ok(bars)
}

//! 아카이브 CSV 행 코덱.
//!
//! 하위 도구들이 의존하는 고정 레이아웃입니다:
//! - 일봉: `date,open,high,low,close,volume`
//! - 틱: `timestamp,price,volume,direction`
//!
//! UTF-8, 쉼표 구분, 헤더 행 포함, `\n` 줄바꿈.

use crate::error::{DataError, Result};
use archive_core::{DataKind, KBarRecord, TickDirection, TickRecord};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::str::FromStr;

/// 날짜 형식 (파일명, 일봉 date 컬럼).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 틱 timestamp 컬럼 형식.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| DataError::Io(e.into_error()))
}

/// 일봉 한 건을 파일 내용으로 직렬화합니다.
pub fn render_kbar(bar: &KBarRecord) -> Result<Vec<u8>> {
    let bar = bar.normalized();
    let mut w = writer();
    w.write_record(DataKind::KBar.header())?;
    w.write_record([
        bar.date.format(DATE_FORMAT).to_string(),
        bar.open.to_string(),
        bar.high.to_string(),
        bar.low.to_string(),
        bar.close.to_string(),
        bar.volume.to_string(),
    ])?;
    finish(w)
}

/// 하루치 틱을 파일 내용으로 직렬화합니다.
pub fn render_ticks(rows: &[TickRecord]) -> Result<Vec<u8>> {
    let mut w = writer();
    w.write_record(DataKind::Tick.header())?;
    for row in rows {
        w.write_record([
            row.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            row.price.normalize().to_string(),
            row.volume.to_string(),
            row.direction.to_string(),
        ])?;
    }
    finish(w)
}

fn reader(bytes: &[u8], kind: DataKind) -> Result<csv::Reader<&[u8]>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);

    let headers = reader.headers()?;
    if headers.iter().ne(kind.header().iter().copied()) {
        return Err(DataError::InvalidData(format!(
            "unexpected {} header: {:?}",
            kind,
            headers.iter().collect::<Vec<_>>()
        )));
    }
    Ok(reader)
}

fn field<'r>(record: &'r csv::StringRecord, idx: usize) -> Result<&'r str> {
    record
        .get(idx)
        .map(str::trim)
        .ok_or_else(|| DataError::InvalidData(format!("missing column {}", idx)))
}

fn decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s).map_err(|e| DataError::ParseError(format!("{}: {}", s, e)))
}

fn integer(s: &str) -> Result<u64> {
    s.parse::<u64>()
        .map_err(|e| DataError::ParseError(format!("{}: {}", s, e)))
}

/// 일봉 파일 내용을 파싱합니다. 행이 하나도 없으면 오류입니다.
pub fn parse_kbars(bytes: &[u8]) -> Result<Vec<KBarRecord>> {
    let mut reader = reader(bytes, DataKind::KBar)?;
    let mut bars = Vec::new();

    for record in reader.records() {
        let record = record?;
        let date = NaiveDate::parse_from_str(field(&record, 0)?, DATE_FORMAT)
            .map_err(|e| DataError::ParseError(e.to_string()))?;
        bars.push(KBarRecord::new(
            date,
            decimal(field(&record, 1)?)?,
            decimal(field(&record, 2)?)?,
            decimal(field(&record, 3)?)?,
            decimal(field(&record, 4)?)?,
            integer(field(&record, 5)?)?,
        ));
    }

    if bars.is_empty() {
        return Err(DataError::InvalidData("kbar file has no rows".to_string()));
    }
    Ok(bars)
}

/// 틱 파일 내용을 파싱합니다. 행이 하나도 없으면 오류입니다.
pub fn parse_ticks(bytes: &[u8]) -> Result<Vec<TickRecord>> {
    let mut reader = reader(bytes, DataKind::Tick)?;
    let mut ticks = Vec::new();

    for record in reader.records() {
        let record = record?;
        let timestamp = NaiveDateTime::parse_from_str(field(&record, 0)?, TIMESTAMP_FORMAT)
            .map_err(|e| DataError::ParseError(e.to_string()))?;
        let direction = TickDirection::from_str(field(&record, 3)?)?;
        ticks.push(TickRecord::new(
            timestamp,
            decimal(field(&record, 1)?)?,
            integer(field(&record, 2)?)?,
            direction,
        ));
    }

    if ticks.is_empty() {
        return Err(DataError::InvalidData("tick file has no rows".to_string()));
    }
    Ok(ticks)
}

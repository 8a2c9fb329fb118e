//! 시나(Sina) 장중 체결 내역 소스.
//!
//! `downxls.php`는 GB2312로 인코딩된 탭 구분 텍스트를 엑셀 MIME 타입으로 내려줍니다:
//!
//! ```text
//! 成交时间	成交价	价格变动	成交量(手)	成交额(元)	性质
//! 15:00:00	10.20	0.01	1234	1258680	买盘
//! ```
//!
//! 해당 일자에 데이터가 없으면 HTML 페이지에 `当天没有数据` 문구가 담겨 옵니다.
//! 합성 틱도 같은 레이아웃으로 인코딩한 뒤 같은 디코더를 통과시키므로
//! 관측 경로와 합성 경로는 디코더에서 합쳐집니다.

use super::crawl::{JobMeta, WorkItem};
use crate::error::{DataError, Result};
use archive_core::{
    synthetic_tick_time, DataKind, KBarRecord, Security, TickDirection, TickRecord,
};
use chrono::{NaiveDate, NaiveTime};
use encoding_rs::GBK;
use rust_decimal::Decimal;
use std::borrow::Cow;
use std::str::FromStr;

/// 실제 체결 내역 응답의 미디어 타입.
pub const TICK_CONTENT_KIND: &str = "application/vnd.ms-excel";

/// "당일 데이터 없음" 페이지 표식.
pub const NO_DATA_MARKER: &str = "当天没有数据";

const TICK_URL: &str = "http://market.finance.sina.com.cn/downxls.php";

const HEADER: &str = "成交时间\t成交价\t价格变动\t成交量(手)\t成交额(元)\t性质";

const BUY: &str = "买盘";
const SELL: &str = "卖盘";
const NEUTRAL: &str = "中性盘";

/// 체결량 단위 (1手 = 100주).
const SHARES_PER_LOT: u64 = 100;

/// 틱 다운로드 URL.
pub fn tick_url(security: &Security, date: NaiveDate) -> String {
    format!(
        "{}?date={}&symbol={}{}",
        TICK_URL,
        date.format("%Y-%m-%d"),
        security.exchange.as_lower(),
        security.code
    )
}

/// 틱 요청 헤더 (브라우저 요청과 동일하게 맞춤).
pub fn tick_headers() -> Vec<(String, String)> {
    [
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        ("Accept-Language", "zh-CN,zh;q=0.8,en;q=0.6"),
        ("Connection", "keep-alive"),
        ("Host", "market.finance.sina.com.cn"),
        ("Referer", "http://vip.stock.finance.sina.com.cn/"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// 특정 거래일 틱 요청 작업 항목.
pub fn tick_work_item(security: &Security, date: NaiveDate) -> WorkItem {
    WorkItem {
        url: tick_url(security, date),
        headers: tick_headers(),
        meta: JobMeta {
            security: security.clone(),
            date: Some(date),
            kind: DataKind::Tick,
        },
    }
}

/// GB2312/GBK 본문을 디코딩합니다. 잘못된 바이트는 대체 문자로 바뀝니다.
pub fn decode_gbk(body: &[u8]) -> Cow<'_, str> {
    GBK.decode_without_bom_handling(body).0
}

/// "당일 데이터 없음" 페이지인지 확인합니다.
pub fn is_no_data_page(body: &[u8]) -> bool {
    decode_gbk(body).contains(NO_DATA_MARKER)
}

fn parse_direction(s: &str) -> Result<TickDirection> {
    match s.trim() {
        BUY => Ok(TickDirection::Buy),
        SELL => Ok(TickDirection::Sell),
        NEUTRAL => Ok(TickDirection::Neutral),
        other => Err(DataError::ParseError(format!("unknown tick nature: {}", other))),
    }
}

/// 체결 내역 본문을 정규 틱 행으로 디코딩합니다.
///
/// 행은 시각 오름차순으로 정렬됩니다. 데이터 행이 하나도 없거나 한 행이라도
/// 해석할 수 없으면 전체가 오류입니다.
pub fn decode_tick_payload(body: &[u8], date: NaiveDate) -> Result<Vec<TickRecord>> {
    let text = decode_gbk(body);
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

    match lines.next() {
        Some(header) if header.starts_with("成交时间") => {}
        other => {
            return Err(DataError::InvalidData(format!(
                "unexpected tick header: {:?}",
                other.map(|h| h.chars().take(40).collect::<String>())
            )))
        }
    }

    let mut ticks = Vec::new();
    for (idx, line) in lines.enumerate() {
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        if fields.len() < 6 {
            return Err(DataError::InvalidData(format!(
                "tick row {} has {} columns",
                idx + 1,
                fields.len()
            )));
        }

        let time = NaiveTime::parse_from_str(fields[0], "%H:%M:%S")
            .map_err(|e| DataError::ParseError(format!("{}: {}", fields[0], e)))?;
        let price = Decimal::from_str(fields[1])
            .map_err(|e| DataError::ParseError(format!("{}: {}", fields[1], e)))?;
        let lots: u64 = fields[3]
            .parse()
            .map_err(|_| DataError::ParseError(format!("bad lot count: {}", fields[3])))?;
        let volume = lots
            .checked_mul(SHARES_PER_LOT)
            .ok_or_else(|| DataError::InvalidData(format!("volume overflow: {}", lots)))?;

        ticks.push(TickRecord::new(
            date.and_time(time),
            price,
            volume,
            parse_direction(fields[5])?,
        ));
    }

    if ticks.is_empty() {
        return Err(DataError::InvalidData("tick payload has no rows".to_string()));
    }

    ticks.sort_by_key(|t| t.timestamp);
    Ok(ticks)
}

/// 일봉에서 체결 내역 한 건을 합성해 소스와 같은 바이트 레이아웃으로 인코딩합니다.
///
/// 15:00:00에 종가로 일봉 거래량 전체가 중립 체결된 것으로 봅니다.
/// 소스 레이아웃은 手 단위이므로 거래량은 가장 가까운 手로 반올림됩니다.
/// 입력이 같으면 출력 바이트도 항상 같습니다.
pub fn synthesize_tick_payload(bar: &KBarRecord) -> Vec<u8> {
    let bar = bar.normalized();
    let lots = volume_in_lots(bar.volume);
    let change = (bar.close - bar.open).normalize();
    let turnover = Decimal::from(lots)
        .checked_mul(Decimal::from(SHARES_PER_LOT))
        .and_then(|shares| shares.checked_mul(bar.close))
        .map(|v| v.round())
        .unwrap_or(Decimal::ZERO);

    let text = format!(
        "{}\n{}\t{}\t{}\t{}\t{}\t{}\n",
        HEADER,
        synthetic_tick_time().format("%H:%M:%S"),
        bar.close,
        change,
        lots,
        turnover,
        NEUTRAL
    );

    GBK.encode(&text).0.into_owned()
}

/// 주 단위 거래량을 手 단위로 반올림합니다. 거래가 있었으면 최소 1手입니다.
fn volume_in_lots(volume: u64) -> u64 {
    if volume == 0 {
        return 0;
    }
    let lots = volume / SHARES_PER_LOT + u64::from(volume % SHARES_PER_LOT >= SHARES_PER_LOT / 2);
    lots.max(1)
}

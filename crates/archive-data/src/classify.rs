//! 응답 분류 및 틱 합성.
//!
//! 응답이 어떻게 도착했는지와 무관한 순수 함수입니다. 네트워크 없이
//! 응답 하나와 (필요하면) 일봉 앵커만으로 결정을 내립니다.
//!
//! # 틱 응답 분류
//!
//! ```text
//! content kind == application/vnd.ms-excel ──▶ 디코딩 성공 ──▶ Observed
//!                                           └─ 디코딩 실패 ──▶ Unclassifiable
//! 본문에 "当天没有数据" ──▶ 일봉 있음 ──▶ 합성 ──▶ Synthesized
//!                      └─ 일봉 없음 ──────────▶ MissingAnchor
//! 그 외 ─────────────────────────────────────▶ Unclassifiable
//! ```

use crate::source::crawl::CrawlResponse;
use crate::source::{netease, sina};
use archive_core::{KBarRecord, TickRecord};
use chrono::NaiveDate;

/// 틱 응답 분류 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickDecision {
    /// 실제 체결 내역 (그대로 기록)
    Observed(Vec<TickRecord>),
    /// 당일 데이터가 없어 일봉에서 합성
    Synthesized(Vec<TickRecord>),
    /// 당일 데이터가 없고 합성 기준 일봉도 없음 (다음 패스에서 재시도)
    MissingAnchor,
    /// 알 수 없는 응답 (소스 형식 변경 의심)
    Unclassifiable { reason: String },
}

/// 틱 응답을 분류합니다.
///
/// `anchor`는 같은 거래일의 일봉입니다. 날짜가 다르면 없는 것으로 봅니다.
pub fn classify_tick_response(
    response: &CrawlResponse,
    date: NaiveDate,
    anchor: Option<&KBarRecord>,
) -> TickDecision {
    let media_type = response.media_type();

    if media_type.as_deref() == Some(sina::TICK_CONTENT_KIND) {
        return match sina::decode_tick_payload(&response.body, date) {
            Ok(rows) => TickDecision::Observed(rows),
            Err(e) => TickDecision::Unclassifiable {
                reason: format!("tick payload rejected: {}", e),
            },
        };
    }

    if sina::is_no_data_page(&response.body) {
        let Some(bar) = anchor.filter(|bar| bar.date == date) else {
            return TickDecision::MissingAnchor;
        };
        let payload = sina::synthesize_tick_payload(bar);
        return match sina::decode_tick_payload(&payload, date) {
            Ok(rows) => TickDecision::Synthesized(rows),
            Err(e) => TickDecision::Unclassifiable {
                reason: format!("synthesized payload rejected: {}", e),
            },
        };
    }

    TickDecision::Unclassifiable {
        reason: format!(
            "unexpected content kind {:?} without no-data marker",
            media_type.unwrap_or_else(|| "<none>".to_string())
        ),
    }
}

/// 일봉 응답 분류 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KBarDecision {
    /// 요청 구간 안의 일봉 (오름차순)
    Bars(Vec<KBarRecord>),
    /// 정상 응답이지만 구간 안에 일봉이 없음
    Empty,
    /// 해석할 수 없는 응답
    Unclassifiable { reason: String },
}

/// 일봉 응답을 분류합니다. 요청 구간 `[start, end]` 밖의 행은 버립니다.
pub fn classify_kbar_response(
    response: &CrawlResponse,
    start: NaiveDate,
    end: NaiveDate,
) -> KBarDecision {
    match netease::decode_kdata_payload(&response.body) {
        Ok(bars) => {
            let bars: Vec<KBarRecord> = bars
                .into_iter()
                .filter(|b| b.date >= start && b.date <= end)
                .collect();
            if bars.is_empty() {
                KBarDecision::Empty
            } else {
                KBarDecision::Bars(bars)
            }
        }
        Err(e) => KBarDecision::Unclassifiable {
            reason: format!("kdata payload rejected: {}", e),
        },
    }
}

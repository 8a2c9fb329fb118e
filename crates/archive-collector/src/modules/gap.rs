//! 갭 계산 모듈.
//!
//! 거래일 캘린더와 아카이브의 차이로 종목별 최소 작업 목록을 만듭니다.
//! 갭은 매 패스마다 새로 계산하며 저장하지 않습니다.

use crate::config::GapConfig;
use archive_core::SecurityItem;
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// 일봉 갭 (양 끝 포함 구간).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KBarGap {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// 일봉 갭 계산.
///
/// - 캘린더가 비었거나 상장일이 `today` 이후면 갭 없음
/// - 저장된 마지막 일봉이 있으면 그 다음 날부터, 없으면
///   상장일(모르면 첫 거래일)과 `history_floor` 중 늦은 날부터
/// - 구간 안에 거래일이 하나도 없으면 갭 없음
pub fn compute_kbar_gap(
    item: &SecurityItem,
    calendar: &[NaiveDate],
    last_stored: Option<NaiveDate>,
    today: NaiveDate,
    config: &GapConfig,
) -> Option<KBarGap> {
    let first_trading_day = calendar.iter().min()?;

    if item.list_date.is_some_and(|listed| listed > today) {
        return None;
    }

    let start = match last_stored {
        Some(last) => last.succ_opt()?,
        None => item
            .list_date
            .unwrap_or(*first_trading_day)
            .max(config.history_floor),
    };

    if start > today || !calendar.iter().any(|d| *d >= start && *d <= today) {
        return None;
    }

    Some(KBarGap { start, end: today })
}

/// 틱 갭 계산.
///
/// (캘린더 ∩ [`tick_available_from`, `today`]) − 유효한 틱이 저장된 거래일.
/// 오름차순으로 반환하므로 마감 시한으로 중단돼도 앞쪽 거래일부터 채워집니다.
pub fn compute_tick_gap(
    calendar: &[NaiveDate],
    stored: &BTreeSet<NaiveDate>,
    today: NaiveDate,
    config: &GapConfig,
) -> BTreeSet<NaiveDate> {
    calendar
        .iter()
        .copied()
        .filter(|d| *d >= config.tick_available_from && *d <= today)
        .filter(|d| !stored.contains(d))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive_core::Security;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn item() -> SecurityItem {
        SecurityItem::new(Security::sh("600000"))
    }

    fn config() -> GapConfig {
        GapConfig {
            tick_available_from: date(2020, 1, 3),
            history_floor: date(2000, 1, 1),
        }
    }

    #[test]
    fn test_empty_calendar_has_no_gap() {
        let today = date(2020, 1, 10);
        assert_eq!(compute_kbar_gap(&item(), &[], None, today, &config()), None);
        assert!(compute_tick_gap(&[], &BTreeSet::new(), today, &config()).is_empty());
    }

    #[test]
    fn test_kbar_gap_without_stored_bars() {
        let calendar = [date(2020, 1, 2), date(2020, 1, 3)];
        let today = date(2020, 1, 10);
        let gap = compute_kbar_gap(&item(), &calendar, None, today, &config()).unwrap();
        assert_eq!(gap, KBarGap { start: date(2020, 1, 2), end: today });
    }

    #[test]
    fn test_kbar_gap_uses_list_date_and_floor() {
        let calendar = [date(1999, 6, 1), date(2020, 1, 2)];
        let today = date(2020, 1, 10);

        let listed = item().with_list_date(date(2019, 5, 6));
        let gap = compute_kbar_gap(&listed, &calendar, None, today, &config()).unwrap();
        assert_eq!(gap.start, date(2019, 5, 6));

        // 상장일이 없으면 첫 거래일, 단 floor보다 앞설 수 없음
        let gap = compute_kbar_gap(&item(), &calendar, None, today, &config()).unwrap();
        assert_eq!(gap.start, date(2000, 1, 1));
    }

    #[test]
    fn test_kbar_gap_after_last_stored() {
        let calendar = [date(2020, 1, 2), date(2020, 1, 3), date(2020, 1, 6)];
        let today = date(2020, 1, 10);

        let gap = compute_kbar_gap(&item(), &calendar, Some(date(2020, 1, 3)), today, &config());
        assert_eq!(gap, Some(KBarGap { start: date(2020, 1, 4), end: today }));

        // 마지막 거래일까지 받았으면 갭 없음
        let gap = compute_kbar_gap(&item(), &calendar, Some(date(2020, 1, 6)), today, &config());
        assert_eq!(gap, None);
    }

    #[test]
    fn test_future_listing_has_no_gap() {
        let calendar = [date(2020, 1, 2), date(2020, 1, 3)];
        let listed = item().with_list_date(date(2020, 2, 1));
        assert_eq!(
            compute_kbar_gap(&listed, &calendar, None, date(2020, 1, 10), &config()),
            None
        );
    }

    #[test]
    fn test_tick_gap_respects_cutoff_and_stored() {
        let calendar = [date(2020, 1, 2), date(2020, 1, 3), date(2020, 1, 6), date(2020, 1, 7)];
        let stored: BTreeSet<_> = [date(2020, 1, 6)].into_iter().collect();
        let gap = compute_tick_gap(&calendar, &stored, date(2020, 1, 6), &config());
        assert_eq!(gap.into_iter().collect::<Vec<_>>(), vec![date(2020, 1, 3)]);
    }

    proptest! {
        #[test]
        fn prop_tick_gap_is_disjoint_from_stored(
            offsets in proptest::collection::btree_set(0i64..60, 0..30),
            stored_mask in proptest::collection::vec(any::<bool>(), 60),
        ) {
            let base = date(2020, 1, 1);
            let calendar: Vec<NaiveDate> =
                offsets.iter().map(|o| base + chrono::Duration::days(*o)).collect();
            let stored: BTreeSet<NaiveDate> = calendar
                .iter()
                .copied()
                .filter(|d| stored_mask[(*d - base).num_days() as usize])
                .collect();
            let today = date(2020, 2, 15);

            let gap = compute_tick_gap(&calendar, &stored, today, &config());
            for d in &gap {
                prop_assert!(!stored.contains(d));
                prop_assert!(calendar.contains(d));
                prop_assert!(*d >= config().tick_available_from && *d <= today);
            }

            // 갭을 모두 채우면 다음 갭은 비어야 함
            let mut filled = stored.clone();
            filled.extend(gap.iter().copied());
            prop_assert!(compute_tick_gap(&calendar, &filled, today, &config()).is_empty());
        }
    }
}

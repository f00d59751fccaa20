//! 불변 거래일 스냅샷.
//!
//! 모든 조회는 정렬된 거래일 배열에 대한 이진 탐색(`partition_point`)으로 수행됩니다.

use crate::error::{DataError, Result};
use quant_core::TradeDay;

/// 거래일 스냅샷.
///
/// `days`는 항상 엄격하게 증가합니다. 갱신 시 새 스냅샷을 만들어 통째로 교체하며
/// 제자리에서 수정하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarSnapshot {
    days: Vec<TradeDay>,
    fetched_at: TradeDay,
}

impl CalendarSnapshot {
    /// 임의 순서의 거래일 목록에서 정렬·중복 제거된 스냅샷을 만듭니다.
    pub fn from_days(days: impl IntoIterator<Item = TradeDay>, fetched_at: TradeDay) -> Self {
        let mut days: Vec<TradeDay> = days.into_iter().collect();
        days.sort_unstable();
        days.dedup();
        Self { days, fetched_at }
    }

    /// 이미 엄격하게 증가하는 목록으로 스냅샷을 만듭니다.
    ///
    /// 순서가 맞지 않으면 `None`을 반환합니다.
    pub fn from_sorted(days: Vec<TradeDay>, fetched_at: TradeDay) -> Option<Self> {
        if days.windows(2).all(|w| w[0] < w[1]) {
            Some(Self { days, fetched_at })
        } else {
            None
        }
    }

    pub fn days(&self) -> &[TradeDay] {
        &self.days
    }

    pub fn fetched_at(&self) -> TradeDay {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn first(&self) -> Option<TradeDay> {
        self.days.first().copied()
    }

    pub fn last(&self) -> Option<TradeDay> {
        self.days.last().copied()
    }

    /// 거래일 여부 (O(log n)).
    pub fn contains(&self, day: TradeDay) -> bool {
        self.days.binary_search(&day).is_ok()
    }

    /// 엄격한 이전 거래일.
    ///
    /// `day`가 첫 거래일 이하이면 `None`. 마지막 거래일보다 뒤이면 마지막 거래일을
    /// 반환합니다 (미래 날짜는 휴장일이 아니라 아직 알 수 없는 날짜).
    pub fn previous(&self, day: TradeDay) -> Result<Option<TradeDay>> {
        self.ensure_not_empty()?;
        let idx = self.days.partition_point(|d| *d < day);
        Ok(idx.checked_sub(1).map(|i| self.days[i]))
    }

    /// 엄격한 다음 거래일.
    pub fn next(&self, day: TradeDay) -> Result<Option<TradeDay>> {
        self.ensure_not_empty()?;
        let idx = self.days.partition_point(|d| *d <= day);
        Ok(self.days.get(idx).copied())
    }

    /// `day`가 거래일이면 그대로, 아니면 이전 거래일.
    pub fn nearest_or_previous(&self, day: TradeDay) -> Result<Option<TradeDay>> {
        self.ensure_not_empty()?;
        if self.contains(day) {
            return Ok(Some(day));
        }
        self.previous(day)
    }

    /// `start <= d <= end`인 모든 거래일.
    pub fn range(&self, start: TradeDay, end: TradeDay) -> Result<&[TradeDay]> {
        self.ensure_not_empty()?;
        if start > end {
            return Ok(&[]);
        }
        let lo = self.days.partition_point(|d| *d < start);
        let hi = self.days.partition_point(|d| *d <= end);
        Ok(&self.days[lo..hi])
    }

    /// 기준 거래일 직전의 거래일 `n`개 (오름차순).
    ///
    /// 기준 거래일은 `nearest_or_previous(day)`이며 결과에 포함되지 않습니다.
    pub fn recent_n_before(&self, day: TradeDay, n: usize) -> Result<&[TradeDay]> {
        let insufficient = |available: usize| DataError::InsufficientHistory {
            day,
            requested: n,
            available,
        };

        self.ensure_not_empty()?;
        if n == 0 {
            return Ok(&[]);
        }
        let anchor = self.nearest_or_previous(day)?.ok_or_else(|| insufficient(0))?;
        let anchor_idx = self.days.partition_point(|d| *d < anchor);
        if anchor_idx < n {
            return Err(insufficient(anchor_idx));
        }
        Ok(&self.days[anchor_idx - n..anchor_idx])
    }

    fn ensure_not_empty(&self) -> Result<()> {
        if self.days.is_empty() {
            Err(DataError::EmptyCalendar)
        } else {
            Ok(())
        }
    }
}

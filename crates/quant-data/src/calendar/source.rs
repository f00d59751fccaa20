//! 외부 거래일 달력 소스.
//!
//! 달력 인덱스는 갱신 시에만 소스를 호출합니다. 소스는 구간 내 각 날짜의 개장 여부를
//! 반환하며, 인덱스가 개장일만 골라 스냅샷을 만듭니다.

use crate::error::Result;
use async_trait::async_trait;
use quant_core::TradeDay;
use serde::{Deserialize, Serialize};

/// 소스가 반환하는 달력 행.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: TradeDay,
    pub is_open: bool,
}

impl CalendarDay {
    pub fn open(date: TradeDay) -> Self {
        Self { date, is_open: true }
    }

    pub fn closed(date: TradeDay) -> Self {
        Self {
            date,
            is_open: false,
        }
    }
}

/// 거래일 달력 소스.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// 로그용 소스 이름.
    fn name(&self) -> &str;

    /// `[start, end]` 구간의 달력 행을 조회합니다.
    async fn fetch_trading_days(&self, start: TradeDay, end: TradeDay) -> Result<Vec<CalendarDay>>;
}

/// 고정된 거래일 목록을 제공하는 소스.
#[derive(Debug, Clone, Default)]
pub struct StaticCalendarSource {
    open_days: Vec<TradeDay>,
}

impl StaticCalendarSource {
    pub fn new(open_days: impl IntoIterator<Item = TradeDay>) -> Self {
        let mut open_days: Vec<TradeDay> = open_days.into_iter().collect();
        open_days.sort_unstable();
        open_days.dedup();
        Self { open_days }
    }
}

#[async_trait]
impl CalendarSource for StaticCalendarSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_trading_days(&self, start: TradeDay, end: TradeDay) -> Result<Vec<CalendarDay>> {
        Ok(self
            .open_days
            .iter()
            .filter(|d| **d >= start && **d <= end)
            .map(|d| CalendarDay::open(*d))
            .collect())
    }
}

/// 월~금을 개장일로 간주하는 오프라인 소스.
///
/// 공휴일은 알 수 없으므로 실제 거래소 달력의 상위 집합을 반환합니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeekdayCalendarSource;

#[async_trait]
impl CalendarSource for WeekdayCalendarSource {
    fn name(&self) -> &str {
        "weekday"
    }

    async fn fetch_trading_days(&self, start: TradeDay, end: TradeDay) -> Result<Vec<CalendarDay>> {
        let mut rows = Vec::new();
        let mut cursor = Some(start);
        while let Some(day) = cursor.filter(|d| *d <= end) {
            rows.push(CalendarDay {
                date: day,
                is_open: !day.is_weekend(),
            });
            cursor = day.succ();
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(v: u32) -> TradeDay {
        TradeDay::new(v).unwrap()
    }

    #[tokio::test]
    async fn test_static_source_filters_range() {
        let source = StaticCalendarSource::new([d(20250106), d(20250102), d(20250103)]);
        let rows = source.fetch_trading_days(d(20250103), d(20250110)).await.unwrap();
        assert_eq!(rows, vec![CalendarDay::open(d(20250103)), CalendarDay::open(d(20250106))]);
    }

    #[tokio::test]
    async fn test_weekday_source_marks_weekends_closed() {
        let rows = WeekdayCalendarSource
            .fetch_trading_days(d(20250103), d(20250106))
            .await
            .unwrap();

        assert_eq!(
            rows,
            vec![
                CalendarDay::open(d(20250103)),
                CalendarDay::closed(d(20250104)),
                CalendarDay::closed(d(20250105)),
                CalendarDay::open(d(20250106)),
            ]
        );
    }

    #[tokio::test]
    async fn test_weekday_source_empty_when_reversed() {
        let rows = WeekdayCalendarSource
            .fetch_trading_days(d(20250106), d(20250103))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}

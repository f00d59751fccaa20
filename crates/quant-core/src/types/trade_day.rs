//! 거래일 값 타입.
//!
//! 거래일은 외부적으로 `YYYYMMDD` 정수(예: `20250102`)로 표현됩니다.
//! 정수 인코딩은 날짜 순서와 일치하므로 정렬 및 이진 탐색에 그대로 사용할 수 있습니다.

use crate::error::{CoreError, CoreResult};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 거래일 (달력 날짜).
///
/// 내부적으로 유효한 `NaiveDate`를 보관하므로 존재하지 않는 날짜(예: `20250230`)는
/// 생성할 수 없습니다. 직렬화 형식은 `YYYYMMDD` 정수입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct TradeDay(NaiveDate);

impl TradeDay {
    /// `YYYYMMDD` 정수에서 생성합니다.
    pub fn new(value: u32) -> CoreResult<Self> {
        let year = (value / 10_000) as i32;
        let month = (value / 100) % 100;
        let day = value % 100;
        Self::from_ymd(year, month, day)
            .map_err(|_| CoreError::InvalidDate(value.to_string()))
    }

    /// 연/월/일에서 생성합니다.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> CoreResult<Self> {
        if !(1000..=9999).contains(&year) {
            return Err(CoreError::InvalidDate(format!(
                "{:04}{:02}{:02}",
                year, month, day
            )));
        }
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or_else(|| CoreError::InvalidDate(format!("{:04}{:02}{:02}", year, month, day)))
    }

    /// `NaiveDate`에서 생성합니다.
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    /// `NaiveDate`로 변환합니다.
    pub fn date(self) -> NaiveDate {
        self.0
    }

    /// `YYYYMMDD` 정수 인코딩.
    pub fn as_u32(self) -> u32 {
        self.0.year() as u32 * 10_000 + self.0.month() * 100 + self.0.day()
    }

    /// 다음 달력일.
    pub fn succ(self) -> Option<Self> {
        self.0.succ_opt().map(Self)
    }

    /// 이전 달력일.
    pub fn pred(self) -> Option<Self> {
        self.0.pred_opt().map(Self)
    }

    /// 토요일 또는 일요일인지 확인합니다.
    pub fn is_weekend(self) -> bool {
        matches!(self.0.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// 두 날짜 사이의 달력일 수 (`self - earlier`).
    pub fn days_since(self, earlier: TradeDay) -> i64 {
        (self.0 - earlier.0).num_days()
    }
}

impl TryFrom<u32> for TradeDay {
    type Error = CoreError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TradeDay> for u32 {
    fn from(day: TradeDay) -> Self {
        day.as_u32()
    }
}

impl From<NaiveDate> for TradeDay {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for TradeDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y%m%d"))
    }
}

impl FromStr for TradeDay {
    type Err = CoreError;

    /// `YYYYMMDD` 또는 `YYYY-MM-DD` 형식을 받습니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let format = if trimmed.len() == 8 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            "%Y%m%d"
        } else if trimmed.len() == 10 && trimmed.contains('-') {
            "%Y-%m-%d"
        } else {
            return Err(CoreError::InvalidDate(s.to_string()));
        };

        NaiveDate::parse_from_str(trimmed, format)
            .map_err(|_| CoreError::InvalidDate(s.to_string()))
            .and_then(|date| Self::from_ymd(date.year(), date.month(), date.day()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_both_formats() {
        let compact: TradeDay = "20250102".parse().unwrap();
        let dashed: TradeDay = "2025-01-02".parse().unwrap();
        assert_eq!(compact, dashed);
        assert_eq!(compact.as_u32(), 20250102);
        assert_eq!(compact.to_string(), "20250102");
    }

    #[test]
    fn test_reject_invalid_dates() {
        assert!("20250230".parse::<TradeDay>().is_err());
        assert!("2025-13-01".parse::<TradeDay>().is_err());
        assert!("2025010".parse::<TradeDay>().is_err());
        assert!("abcdefgh".parse::<TradeDay>().is_err());
        assert!(TradeDay::new(20250000).is_err());
        assert!(TradeDay::new(1231).is_err());
    }

    #[test]
    fn test_ordering_matches_integer_encoding() {
        let a = TradeDay::new(20241231).unwrap();
        let b = TradeDay::new(20250102).unwrap();
        assert!(a < b);
        assert!(a.as_u32() < b.as_u32());
        assert_eq!(b.days_since(a), 2);
    }

    #[test]
    fn test_serde_as_integer() {
        let day = TradeDay::new(20250106).unwrap();
        assert_eq!(serde_json::to_string(&day).unwrap(), "20250106");

        let back: TradeDay = serde_json::from_str("20250106").unwrap();
        assert_eq!(back, day);

        assert!(serde_json::from_str::<TradeDay>("20250132").is_err());
    }

    #[test]
    fn test_weekend_and_neighbors() {
        let saturday = TradeDay::new(20250104).unwrap();
        assert!(saturday.is_weekend());
        assert_eq!(saturday.succ().unwrap().as_u32(), 20250105);
        assert_eq!(saturday.pred().unwrap().as_u32(), 20250103);
        assert!(!saturday.pred().unwrap().is_weekend());
    }

    proptest::proptest! {
        #[test]
        fn prop_display_roundtrip(offset in 0i64..40_000) {
            let base = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
            let day = TradeDay::from_date(base + chrono::Duration::days(offset));
            let parsed: TradeDay = day.to_string().parse().unwrap();
            proptest::prop_assert_eq!(parsed, day);
            proptest::prop_assert_eq!(TradeDay::new(day.as_u32()).unwrap(), day);
        }
    }
}

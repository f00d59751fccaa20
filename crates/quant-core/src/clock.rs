//! 시계 추상화.
//!
//! 캐시 신선도와 달력 갱신 판단은 "현재 시각"에 의존하므로,
//! 테스트에서 시간을 고정하거나 이동할 수 있도록 시계를 주입받습니다.

use crate::types::TradeDay;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::RwLock;

/// 현재 시각 제공자.
pub trait Clock: Send + Sync {
    /// 현재 UTC 시각.
    fn now(&self) -> DateTime<Utc>;
}

/// 시스템 시계.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 수동으로 설정하는 시계 (테스트용).
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// 주어진 시각으로 고정된 시계를 생성합니다.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// 시각을 설정합니다.
    pub fn set(&self, now: DateTime<Utc>) {
        let mut guard = self.now.write().unwrap_or_else(|e| e.into_inner());
        *guard = now;
    }

    /// 시각을 앞으로 이동합니다.
    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.write().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// 주어진 시간대 기준의 오늘 날짜.
pub fn today<Tz: TimeZone>(clock: &dyn Clock, tz: &Tz) -> TradeDay {
    TradeDay::from_date(clock.now().with_timezone(tz).date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let start = Utc.with_ymd_and_hms(2025, 1, 2, 1, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::days(2));
        assert_eq!(clock.now(), start + Duration::days(2));
    }

    #[test]
    fn test_today_respects_timezone() {
        // 2025-01-02 20:00 UTC = 2025-01-03 04:00 Asia/Shanghai
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 2, 20, 0, 0).unwrap());
        assert_eq!(today(&clock, &Utc).as_u32(), 20250102);
        assert_eq!(today(&clock, &chrono_tz::Asia::Shanghai).as_u32(), 20250103);
    }
}

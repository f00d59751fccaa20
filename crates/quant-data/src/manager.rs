//! 데이터 계층 파사드.
//!
//! 달력 인덱스, 캐시 저장소, 부분 구간 코디네이터를 묶어 하나의 진입점을 제공합니다.
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! use quant_data::QuantData;
//!
//! let data = QuantData::from_config(&config).await?;
//! let rows = data
//!     .get_or_fetch("daily", Some("000001"), "2025-01-02", "20250110", &producer, None)
//!     .await?;
//! let open = data.is_trading_day("20250104").await?;
//! ```

use crate::cache::{DataProducer, PartialRangeCacheCoordinator, RangeData, RangeRequest, ResolveStats};
use crate::calendar::{
    CalendarDay, CalendarSource, TradingCalendar, TushareCalendarSource, WeekdayCalendarSource,
};
use crate::error::Result;
use crate::storage::{RangeCacheStore, SqliteRangeStore};
use chrono::NaiveDate;
use quant_core::{AppConfig, CalendarSourceKind, Clock, SystemClock, TradeDay};
use std::sync::Arc;
use tracing::{info, instrument};

/// 거래일로 변환 가능한 날짜 입력.
///
/// `TradeDay`, `NaiveDate`, `YYYYMMDD` 정수, `YYYYMMDD`/`YYYY-MM-DD` 문자열을 받으며,
/// `None`은 오늘(시장 시간대)로 해석합니다.
pub trait IntoTradeDay {
    fn into_trade_day(self, today: TradeDay) -> Result<TradeDay>;
}

impl IntoTradeDay for TradeDay {
    fn into_trade_day(self, _today: TradeDay) -> Result<TradeDay> {
        Ok(self)
    }
}

impl IntoTradeDay for NaiveDate {
    fn into_trade_day(self, _today: TradeDay) -> Result<TradeDay> {
        Ok(TradeDay::from_date(self))
    }
}

impl IntoTradeDay for u32 {
    fn into_trade_day(self, _today: TradeDay) -> Result<TradeDay> {
        Ok(TradeDay::new(self)?)
    }
}

impl IntoTradeDay for &str {
    fn into_trade_day(self, _today: TradeDay) -> Result<TradeDay> {
        Ok(self.parse::<TradeDay>()?)
    }
}

impl IntoTradeDay for &String {
    fn into_trade_day(self, today: TradeDay) -> Result<TradeDay> {
        self.as_str().into_trade_day(today)
    }
}

impl IntoTradeDay for String {
    fn into_trade_day(self, today: TradeDay) -> Result<TradeDay> {
        self.as_str().into_trade_day(today)
    }
}

impl<T: IntoTradeDay> IntoTradeDay for Option<T> {
    fn into_trade_day(self, today: TradeDay) -> Result<TradeDay> {
        match self {
            Some(value) => value.into_trade_day(today),
            None => Ok(today),
        }
    }
}

/// 데이터 계층 파사드.
pub struct QuantData {
    calendar: Arc<TradingCalendar>,
    store: Arc<dyn RangeCacheStore>,
    coordinator: PartialRangeCacheCoordinator,
    default_update_frequency_days: u32,
}

impl QuantData {
    /// 달력과 저장소로 파사드를 생성합니다. 기본 갱신 주기는 1일입니다.
    pub fn new(calendar: Arc<TradingCalendar>, store: Arc<dyn RangeCacheStore>) -> Self {
        let coordinator = PartialRangeCacheCoordinator::new(calendar.clone(), store.clone());
        Self {
            calendar,
            store,
            coordinator,
            default_update_frequency_days: 1,
        }
    }

    /// 갱신 주기를 지정하지 않은 요청에 적용할 기본값.
    pub fn with_default_update_frequency(mut self, days: u32) -> Self {
        self.default_update_frequency_days = days;
        self
    }

    /// 설정으로 파사드를 구성합니다 (시스템 시계 사용).
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        Self::from_config_with_clock(config, Arc::new(SystemClock)).await
    }

    /// 설정과 시계로 파사드를 구성합니다.
    pub async fn from_config_with_clock(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let source: Arc<dyn CalendarSource> = match config.calendar.source {
            CalendarSourceKind::Tushare => Arc::new(
                TushareCalendarSource::from_config(&config.tushare)?
                    .with_exchange(config.calendar.exchange.clone()),
            ),
            CalendarSourceKind::Weekday => Arc::new(WeekdayCalendarSource),
        };

        let calendar = TradingCalendar::new(source.clone())
            .with_snapshot_file(config.calendar.snapshot_path.clone())
            .with_timezone(config.calendar.timezone()?)
            .with_history_start(config.calendar.history_start()?)
            .with_clock(clock.clone());

        let store = SqliteRangeStore::connect(&config.cache.database_url, config.cache.max_connections)
            .await?
            .with_clock(clock);

        info!(
            source = source.name(),
            database = %config.cache.database_url,
            snapshot = %config.calendar.snapshot_path.display(),
            "데이터 계층 초기화"
        );

        Ok(Self::new(Arc::new(calendar), Arc::new(store))
            .with_default_update_frequency(config.cache.default_update_frequency_days))
    }

    pub fn calendar(&self) -> &Arc<TradingCalendar> {
        &self.calendar
    }

    pub fn store(&self) -> &Arc<dyn RangeCacheStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &PartialRangeCacheCoordinator {
        &self.coordinator
    }

    pub fn default_update_frequency_days(&self) -> u32 {
        self.default_update_frequency_days
    }

    /// 시장 시간대 기준 오늘.
    pub fn today(&self) -> TradeDay {
        self.calendar.today()
    }

    fn day(&self, input: impl IntoTradeDay) -> Result<TradeDay> {
        input.into_trade_day(self.calendar.today())
    }

    /// 캐시 우선 구간 조회.
    ///
    /// `update_frequency_days`가 `None`이면 설정된 기본 주기를 사용합니다.
    #[instrument(skip(self, start, end, producer))]
    pub async fn get_or_fetch(
        &self,
        domain: &str,
        entity_id: Option<&str>,
        start: impl IntoTradeDay,
        end: impl IntoTradeDay,
        producer: &dyn DataProducer,
        update_frequency_days: Option<u32>,
    ) -> Result<RangeData> {
        let request = self.request(domain, entity_id, start, end)?;
        self.coordinator
            .resolve(
                &request,
                producer,
                update_frequency_days.unwrap_or(self.default_update_frequency_days),
            )
            .await
    }

    /// `get_or_fetch`와 같지만 호출 통계를 함께 반환합니다.
    pub async fn get_or_fetch_with_stats(
        &self,
        domain: &str,
        entity_id: Option<&str>,
        start: impl IntoTradeDay,
        end: impl IntoTradeDay,
        producer: &dyn DataProducer,
        update_frequency_days: Option<u32>,
    ) -> Result<(RangeData, ResolveStats)> {
        let request = self.request(domain, entity_id, start, end)?;
        self.coordinator
            .resolve_with_stats(
                &request,
                producer,
                update_frequency_days.unwrap_or(self.default_update_frequency_days),
            )
            .await
    }

    fn request(
        &self,
        domain: &str,
        entity_id: Option<&str>,
        start: impl IntoTradeDay,
        end: impl IntoTradeDay,
    ) -> Result<RangeRequest> {
        let mut request = RangeRequest::new(domain, self.day(start)?, self.day(end)?);
        request.entity_id = entity_id.map(str::to_string);
        Ok(request)
    }

    /// 거래일 여부.
    pub async fn is_trading_day(&self, date: impl IntoTradeDay) -> Result<bool> {
        let day = self.day(date)?;
        Ok(self.calendar.ensure_loaded().await?.contains(day))
    }

    /// 엄격한 이전 거래일.
    pub async fn previous_trading_day(&self, date: impl IntoTradeDay) -> Result<Option<TradeDay>> {
        let day = self.day(date)?;
        self.calendar.ensure_loaded().await?.previous(day)
    }

    /// 엄격한 다음 거래일.
    pub async fn next_trading_day(&self, date: impl IntoTradeDay) -> Result<Option<TradeDay>> {
        let day = self.day(date)?;
        self.calendar.ensure_loaded().await?.next(day)
    }

    /// `date`가 거래일이면 그대로, 아니면 이전 거래일.
    pub async fn nearest_or_previous_trading_day(
        &self,
        date: impl IntoTradeDay,
    ) -> Result<Option<TradeDay>> {
        let day = self.day(date)?;
        self.calendar.ensure_loaded().await?.nearest_or_previous(day)
    }

    /// `[start, end]` 구간의 거래일.
    pub async fn trading_days_in_range(
        &self,
        start: impl IntoTradeDay,
        end: impl IntoTradeDay,
    ) -> Result<Vec<TradeDay>> {
        let (start, end) = (self.day(start)?, self.day(end)?);
        Ok(self.calendar.ensure_loaded().await?.range(start, end)?.to_vec())
    }

    /// 기준일 직전 거래일 `n`개 (오름차순).
    pub async fn recent_trading_days(&self, date: impl IntoTradeDay, n: usize) -> Result<Vec<TradeDay>> {
        let day = self.day(date)?;
        Ok(self.calendar.ensure_loaded().await?.recent_n_before(day, n)?.to_vec())
    }

    /// 달력 갱신.
    pub async fn refresh_calendar(&self, force: bool) -> Result<()> {
        if force {
            self.calendar.refresh(true).await
        } else {
            self.calendar.load().await
        }
    }

    /// 달력 소스의 원본 행 조회 (스냅샷 미사용).
    pub async fn trading_days_info(
        &self,
        start: impl IntoTradeDay,
        end: impl IntoTradeDay,
    ) -> Result<Vec<CalendarDay>> {
        let (start, end) = (self.day(start)?, self.day(end)?);
        self.calendar.trading_days_info(start, end).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::StaticCalendarSource;
    use crate::error::DataError;
    use crate::storage::MemoryRangeStore;
    use chrono::{TimeZone, Utc};
    use quant_core::ManualClock;

    fn d(v: u32) -> TradeDay {
        TradeDay::new(v).unwrap()
    }

    fn build() -> QuantData {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 8, 2, 0, 0).unwrap(),
        ));
        let source = StaticCalendarSource::new(
            [20250102, 20250103, 20250106, 20250107, 20250108].map(d),
        );
        let calendar = TradingCalendar::new(Arc::new(source)).with_clock(clock.clone());
        let store = MemoryRangeStore::new().with_clock(clock);
        QuantData::new(Arc::new(calendar), Arc::new(store))
    }

    #[test]
    fn test_into_trade_day_inputs() {
        let today = d(20250108);
        assert_eq!("20250102".into_trade_day(today).unwrap(), d(20250102));
        assert_eq!("2025-01-02".into_trade_day(today).unwrap(), d(20250102));
        assert_eq!(20250102u32.into_trade_day(today).unwrap(), d(20250102));
        assert_eq!(None::<&str>.into_trade_day(today).unwrap(), today);
        assert!(matches!(
            "2025/01/02".into_trade_day(today),
            Err(DataError::InvalidDate(_))
        ));
    }

    #[tokio::test]
    async fn test_calendar_queries_load_lazily() {
        let data = build();
        assert!(!data.is_trading_day("2025-01-04").await.unwrap());
        assert_eq!(data.previous_trading_day("20250104").await.unwrap(), Some(d(20250103)));
        assert_eq!(data.next_trading_day(d(20250104)).await.unwrap(), Some(d(20250106)));
        assert_eq!(
            data.trading_days_in_range("20250103", None::<TradeDay>).await.unwrap(),
            vec![d(20250103), d(20250106), d(20250107), d(20250108)]
        );
        assert_eq!(
            data.recent_trading_days("20250107", 2).await.unwrap(),
            vec![d(20250103), d(20250106)]
        );
    }

    #[tokio::test]
    async fn test_trading_days_info_passthrough() {
        let data = build();
        let rows = data.trading_days_info("20250101", "20250105").await.unwrap();
        assert_eq!(rows, vec![CalendarDay::open(d(20250102)), CalendarDay::open(d(20250103))]);
        // 원본 조회는 스냅샷을 만들지 않음
        assert!(data.calendar().snapshot().is_err());
    }
}

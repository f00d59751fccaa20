//! 거래일 달력과 부분 날짜 구간 캐시.
//!
//! 이 crate는 다음을 제공합니다:
//! - 이진 탐색 기반 거래일 달력 인덱스 (스냅샷 파일 영속화, Tushare 소스)
//! - 날짜 단위 캐시 저장소 (SQLite, 메모리)
//! - 누락 구간만 가져오는 부분 구간 캐시 코디네이터
//! - 데이터 계층 파사드와 전역 레지스트리

pub mod cache;
pub mod calendar;
pub mod error;
pub mod manager;
pub mod registry;
pub mod storage;

pub use error::{DataError, Result};
pub use manager::{IntoTradeDay, QuantData};

// 달력 재내보내기
pub use calendar::{
    CalendarDay, CalendarSnapshot, CalendarSource, StaticCalendarSource, TradingCalendar,
    TushareCalendarSource, WeekdayCalendarSource,
};

// 캐시 재내보내기
pub use cache::{
    DataProducer, PartialRangeCacheCoordinator, ProducerOutput, RangeData, RangeRequest,
    ResolveStats,
};

// 저장소 재내보내기
pub use storage::{
    is_fresh, CacheRecord, DomainStats, FetchGap, MemoryRangeStore, RangeCacheStore,
    SqliteRangeStore,
};

//! 거래일 달력.
//!
//! - `snapshot`: 정렬된 거래일 배열과 이진 탐색 조회
//! - `persist`: 버전이 있는 JSON 스냅샷 파일
//! - `source`: 외부 달력 소스 트레이트와 오프라인 구현
//! - `tushare`: Tushare Pro `trade_cal` 소스
//! - `index`: 스냅샷 로드/갱신을 관리하는 `TradingCalendar`

pub mod index;
pub mod persist;
pub mod snapshot;
pub mod source;
pub mod tushare;

pub use index::TradingCalendar;
pub use persist::{SnapshotFile, SNAPSHOT_VERSION};
pub use snapshot::CalendarSnapshot;
pub use source::{CalendarDay, CalendarSource, StaticCalendarSource, WeekdayCalendarSource};
pub use tushare::TushareCalendarSource;

//! 달력 기반 부분 구간 캐시.
//!
//! 반복되거나 겹치는 날짜 구간 요청은 이미 저장된 날짜별 결과를 재사용하고,
//! 누락된 하위 구간만 생산자에게 요청합니다.

pub mod coordinator;
pub mod lock;
pub mod producer;
pub mod request;

pub use coordinator::{PartialRangeCacheCoordinator, ResolveStats};
pub use lock::FetchLockMap;
pub use producer::{DataProducer, ProducerOutput};
pub use request::{RangeData, RangeRequest};

//! 부분 구간 캐시 코디네이터.
//!
//! # 동작 흐름
//!
//! ```text
//! 요청 (domain, entity_id, start, end)
//!         │
//!         ▼
//! ┌─────────────────────────┐
//! │ 1. 거래일 목록 확장      │ ← 달력 인덱스
//! └───────────┬─────────────┘
//!             │
//! ┌───────────▼─────────────┐
//! │ 2. 누락 구간 스캔        │ ← 없음/손상/오래됨
//! └───────────┬─────────────┘
//!             │
//!     ┌───────┴───────┐
//!     │  누락 구간?    │
//!     └───────┬───────┘
//!       NO    │ YES
//!             │   │
//!             │   ▼
//!             │ ┌──────────────────────────┐
//!             │ │ 3. 키 Lock 획득 후 재스캔 │ ← 다른 요청이 이미 채웠는가?
//!             │ └────────────┬─────────────┘
//!             │              │
//!             │ ┌────────────▼─────────────┐
//!             │ │ 4. 생산자 호출 → 저장     │
//!             │ └────────────┬─────────────┘
//!             ▼              ▼
//!     ┌──────────────────────────┐
//!     │ 5. 저장소에서 병합 반환   │
//!     └──────────────────────────┘
//! ```

use super::lock::FetchLockMap;
use super::producer::{DataProducer, ProducerOutput};
use super::request::{RangeData, RangeRequest};
use crate::calendar::TradingCalendar;
use crate::error::{DataError, Result};
use crate::storage::{is_fresh, validate_domain, FetchGap, RangeCacheStore};
use quant_core::TradeDay;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// 한 번의 `resolve` 호출 통계.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    /// 요청 구간의 거래일 수
    pub requested_days: usize,
    /// 첫 스캔에서 신선했던 거래일 수
    pub cached_days: usize,
    /// 첫 스캔에서 발견한 누락 구간 수
    pub gaps: usize,
    /// Lock 획득 후 이미 채워져 있던 구간 수
    pub deduplicated_gaps: usize,
    /// 생산자 호출 횟수
    pub producer_calls: usize,
    /// 저장한 날짜 수
    pub persisted_days: usize,
    /// 실패한 구간 수
    pub failed_gaps: usize,
}

/// 부분 구간 캐시 코디네이터.
pub struct PartialRangeCacheCoordinator {
    calendar: Arc<TradingCalendar>,
    store: Arc<dyn RangeCacheStore>,
    fetch_locks: FetchLockMap,
}

impl PartialRangeCacheCoordinator {
    pub fn new(calendar: Arc<TradingCalendar>, store: Arc<dyn RangeCacheStore>) -> Self {
        Self {
            calendar,
            store,
            fetch_locks: FetchLockMap::new(),
        }
    }

    pub fn calendar(&self) -> &Arc<TradingCalendar> {
        &self.calendar
    }

    pub fn store(&self) -> &Arc<dyn RangeCacheStore> {
        &self.store
    }

    /// 캐시 우선으로 구간 데이터를 조회하고, 누락 구간만 생산자에서 가져옵니다.
    pub async fn resolve(
        &self,
        request: &RangeRequest,
        producer: &dyn DataProducer,
        update_frequency_days: u32,
    ) -> Result<RangeData> {
        self.resolve_with_stats(request, producer, update_frequency_days)
            .await
            .map(|(data, _)| data)
    }

    /// `resolve`와 같지만 호출 통계를 함께 반환합니다.
    ///
    /// 구간 하나가 실패해도 나머지 구간은 계속 시도하며, 이미 저장한 구간은 유지됩니다.
    /// 실패가 있으면 첫 번째 실패 구간의 오류를 반환합니다. 저장소 오류는 즉시 중단합니다.
    #[instrument(
        skip(self, producer),
        fields(
            domain = %request.domain,
            entity = request.entity().unwrap_or("-"),
            start = %request.start,
            end = %request.end,
        )
    )]
    pub async fn resolve_with_stats(
        &self,
        request: &RangeRequest,
        producer: &dyn DataProducer,
        update_frequency_days: u32,
    ) -> Result<(RangeData, ResolveStats)> {
        validate_domain(&request.domain)?;
        let mut stats = ResolveStats::default();

        // 1. 거래일 목록
        let snapshot = self.calendar.ensure_loaded().await?;
        let day_list = snapshot.range(request.start, request.end)?.to_vec();
        if day_list.is_empty() {
            debug!("요청 구간에 거래일 없음");
            return Ok((RangeData::Empty, stats));
        }
        stats.requested_days = day_list.len();

        // 2. 누락 구간 스캔
        let now = self.calendar.now();
        let gaps = self
            .store
            .scan_missing(
                &request.domain,
                request.entity(),
                &day_list,
                update_frequency_days,
                &now,
            )
            .await?;
        stats.gaps = gaps.len();
        stats.cached_days = day_list.len() - gaps.iter().map(FetchGap::len).sum::<usize>();

        // 3~4. 구간별 채우기
        let mut first_failure: Option<DataError> = None;
        for gap in &gaps {
            match self
                .fill_gap(request, gap, producer, update_frequency_days, &mut stats)
                .await
            {
                Ok(()) => {}
                Err(e @ (DataError::FetchFailed { .. } | DataError::ProducerContract { .. })) => {
                    stats.failed_gaps += 1;
                    warn!(gap = %gap, error = %e, "구간 채우기 실패, 다음 구간 계속");
                    first_failure.get_or_insert(e);
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(e) = first_failure {
            return Err(e);
        }

        // 5. 병합
        let data = self
            .merge(request, &day_list, update_frequency_days)
            .await?;

        if stats.gaps > 0 {
            info!(
                requested = stats.requested_days,
                cached = stats.cached_days,
                gaps = stats.gaps,
                producer_calls = stats.producer_calls,
                persisted = stats.persisted_days,
                "구간 캐시 갱신 완료"
            );
        } else {
            debug!(requested = stats.requested_days, "전체 캐시 적중");
        }

        Ok((data, stats))
    }

    /// 키 Lock 아래에서 구간을 다시 확인하고 남은 누락 부분만 생산자에서 가져옵니다.
    async fn fill_gap(
        &self,
        request: &RangeRequest,
        gap: &FetchGap,
        producer: &dyn DataProducer,
        update_frequency_days: u32,
        stats: &mut ResolveStats,
    ) -> Result<()> {
        let _guard = self
            .fetch_locks
            .acquire(&request.domain, request.entity())
            .await;

        let now = self.calendar.now();
        let remaining = self
            .store
            .scan_missing(
                &request.domain,
                request.entity(),
                &gap.days,
                update_frequency_days,
                &now,
            )
            .await?;

        if remaining.is_empty() {
            debug!(gap = %gap, "다른 요청이 이미 구간을 채움");
            stats.deduplicated_gaps += 1;
            return Ok(());
        }

        for sub in remaining {
            stats.producer_calls += 1;
            debug!(gap = %sub, days = sub.len(), "생산자 호출");

            let output = producer
                .fetch(request.entity(), sub.start, sub.end)
                .await
                .map_err(|source| DataError::FetchFailed {
                    domain: request.domain.clone(),
                    entity_id: request.entity_id.clone(),
                    gap: sub.clone(),
                    source,
                })?;

            let rows = accept_output(&request.domain, &sub, output)?;
            for (day, payload) in &rows {
                self.store
                    .put(&request.domain, request.entity(), *day, payload)
                    .await?;
            }
            stats.persisted_days += rows.len();
        }

        Ok(())
    }

    /// 신선한 레코드만 병합합니다. 재조회에 실패해 오래된 채로 남은 날짜는 누락으로 취급합니다.
    async fn merge(
        &self,
        request: &RangeRequest,
        day_list: &[TradeDay],
        update_frequency_days: u32,
    ) -> Result<RangeData> {
        let (first, last) = (day_list[0], day_list[day_list.len() - 1]);
        let now = self.calendar.now();
        let mut records: BTreeMap<TradeDay, Value> = self
            .store
            .get_range(&request.domain, request.entity(), first, last)
            .await?
            .into_iter()
            // 거래일 목록에 없는 날짜의 레코드는 제외
            .filter(|r| day_list.binary_search(&r.date_key).is_ok())
            .filter(|r| is_fresh(r, update_frequency_days, &now))
            .map(|r| (r.date_key, r.payload))
            .collect();

        if day_list.len() == 1 {
            return Ok(records
                .remove(&first)
                .map_or(RangeData::Empty, RangeData::Single));
        }
        Ok(RangeData::Daily(records))
    }
}

/// 생산자 응답을 검증하고 구간에 속한 `(날짜, 페이로드)`만 남깁니다.
fn accept_output(
    domain: &str,
    gap: &FetchGap,
    output: ProducerOutput,
) -> Result<Vec<(TradeDay, Value)>> {
    match output {
        ProducerOutput::Single(payload) if gap.is_single_day() => Ok(vec![(gap.start, payload)]),
        ProducerOutput::Single(_) => Err(DataError::ProducerContract {
            domain: domain.to_string(),
            gap: gap.clone(),
            reason: format!("scalar payload for a {}-day gap", gap.len()),
        }),
        ProducerOutput::Daily(rows) => {
            let returned = rows.len();
            let accepted: Vec<(TradeDay, Value)> = rows
                .into_iter()
                .filter(|(day, _)| {
                    let inside = gap.contains(*day);
                    if !inside {
                        warn!(gap = %gap, day = %day, "구간 밖 날짜는 저장하지 않음");
                    }
                    inside
                })
                .collect();

            if accepted.len() < gap.len() {
                debug!(
                    gap = %gap,
                    returned,
                    missing = gap.len() - accepted.len(),
                    "생산자 응답에 일부 날짜 없음"
                );
            }
            Ok(accepted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(v: u32) -> TradeDay {
        TradeDay::new(v).unwrap()
    }

    fn gap(days: &[u32]) -> FetchGap {
        let days: Vec<TradeDay> = days.iter().map(|v| d(*v)).collect();
        FetchGap {
            start: days[0],
            end: days[days.len() - 1],
            days,
        }
    }

    #[test]
    fn test_scalar_for_single_day_gap() {
        let rows = accept_output("daily", &gap(&[20250102]), ProducerOutput::Single(json!(7))).unwrap();
        assert_eq!(rows, vec![(d(20250102), json!(7))]);
    }

    #[test]
    fn test_scalar_for_multi_day_gap_rejected() {
        let err = accept_output(
            "daily",
            &gap(&[20250102, 20250103]),
            ProducerOutput::Single(json!(7)),
        )
        .unwrap_err();
        assert!(matches!(err, DataError::ProducerContract { .. }));
    }

    #[test]
    fn test_out_of_gap_days_dropped() {
        let output = ProducerOutput::daily([
            (d(20250102), json!(1)),
            (d(20250104), json!("weekend")),
            (d(20250106), json!(3)),
            (d(20250110), json!("later")),
        ]);
        let rows = accept_output("daily", &gap(&[20250102, 20250103, 20250106]), output).unwrap();
        assert_eq!(rows, vec![(d(20250102), json!(1)), (d(20250106), json!(3))]);
    }
}

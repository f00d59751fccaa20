//! 날짜 단위 캐시 저장소.
//!
//! 레코드 키는 `(domain, entity_id, date_key)`이며, 페이로드는 JSON 값으로 저장됩니다.
//!
//! - `sqlite`: sqlx SQLite 영구 저장소 (도메인별 테이블)
//! - `memory`: 프로세스 내 저장소 (테스트/일회성 실행)

pub mod memory;
pub mod sqlite;

pub use memory::MemoryRangeStore;
pub use sqlite::SqliteRangeStore;

use crate::error::{DataError, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use quant_core::TradeDay;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// 도메인 이름 최대 길이.
const MAX_DOMAIN_LEN: usize = 64;

/// 캐시 레코드.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheRecord {
    pub domain: String,
    pub entity_id: Option<String>,
    pub date_key: TradeDay,
    pub payload: Value,
    pub written_at: DateTime<Utc>,
}

/// 신선한 레코드가 없는 연속 구간.
///
/// `days`는 요청 날짜 목록에서 연속한 누락 거래일이며 `start`/`end`는 그 양 끝입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchGap {
    pub start: TradeDay,
    pub end: TradeDay,
    pub days: Vec<TradeDay>,
}

impl FetchGap {
    /// 하루짜리 구간.
    pub fn single(day: TradeDay) -> Self {
        Self {
            start: day,
            end: day,
            days: vec![day],
        }
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn is_single_day(&self) -> bool {
        self.days.len() == 1
    }

    pub fn contains(&self, day: TradeDay) -> bool {
        self.days.binary_search(&day).is_ok()
    }
}

impl fmt::Display for FetchGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// `(day, covered)` 순서열에서 연속한 누락 날짜를 구간으로 묶습니다.
pub fn collapse_gaps(classified: impl IntoIterator<Item = (TradeDay, bool)>) -> Vec<FetchGap> {
    let mut gaps = Vec::new();
    let mut run: Vec<TradeDay> = Vec::new();

    for (day, covered) in classified {
        if covered {
            if !run.is_empty() {
                gaps.push(gap_from_run(std::mem::take(&mut run)));
            }
        } else {
            run.push(day);
        }
    }
    if !run.is_empty() {
        gaps.push(gap_from_run(run));
    }
    gaps
}

fn gap_from_run(days: Vec<TradeDay>) -> FetchGap {
    FetchGap {
        start: days[0],
        end: days[days.len() - 1],
        days,
    }
}

/// 레코드가 `now` 기준으로 아직 신선한지 확인합니다.
///
/// 경과 일수는 `now`의 시간대에서 날짜만 비교해 계산하며, 경과 일수가 주기와 같으면
/// 오래된 것으로 봅니다. `update_frequency_days == 0`은 영구 보관입니다.
pub fn is_fresh<Z: TimeZone>(record: &CacheRecord, update_frequency_days: u32, now: &DateTime<Z>) -> bool {
    if update_frequency_days == 0 {
        return true;
    }
    let written = record.written_at.with_timezone(&now.timezone()).date_naive();
    let elapsed = (now.date_naive() - written).num_days();
    elapsed < i64::from(update_frequency_days)
}

/// 도메인 이름 검증 (`[A-Za-z0-9_]{1,64}`).
pub fn validate_domain(domain: &str) -> Result<()> {
    let valid = !domain.is_empty()
        && domain.len() <= MAX_DOMAIN_LEN
        && domain.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(DataError::InvalidDomain(domain.to_string()))
    }
}

/// 도메인 통계.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DomainStats {
    pub domain: String,
    pub records: u64,
    pub entities: u64,
    pub first_date: Option<TradeDay>,
    pub last_date: Option<TradeDay>,
    pub oldest_write: Option<DateTime<Utc>>,
    pub newest_write: Option<DateTime<Utc>>,
}

/// 날짜 단위 캐시 저장소.
#[async_trait]
pub trait RangeCacheStore: Send + Sync {
    /// 레코드 조회. 없거나 손상된 레코드는 `None` (손상은 로그만 남김).
    async fn get(
        &self,
        domain: &str,
        entity_id: Option<&str>,
        date_key: TradeDay,
    ) -> Result<Option<CacheRecord>>;

    /// 레코드 저장 (upsert). `written_at`은 저장소 시계의 현재 시각입니다.
    async fn put(
        &self,
        domain: &str,
        entity_id: Option<&str>,
        date_key: TradeDay,
        payload: &Value,
    ) -> Result<()>;

    /// `[start, end]` 구간의 레코드 (날짜 오름차순, 손상 레코드 제외).
    async fn get_range(
        &self,
        domain: &str,
        entity_id: Option<&str>,
        start: TradeDay,
        end: TradeDay,
    ) -> Result<Vec<CacheRecord>>;

    /// 도메인 통계.
    async fn stats(&self, domain: &str) -> Result<DomainStats>;

    /// 한 엔티티의 레코드를 모두 삭제하고 삭제 건수를 반환합니다.
    async fn purge_entity(&self, domain: &str, entity_id: Option<&str>) -> Result<u64>;

    /// 도메인의 레코드를 모두 삭제하고 삭제 건수를 반환합니다.
    async fn purge_domain(&self, domain: &str) -> Result<u64>;

    /// 날짜 목록에서 신선한 레코드가 없는 연속 구간을 찾습니다.
    ///
    /// `day_list`는 오름차순이어야 합니다. 구간 전체를 한 번에 읽은 뒤 날짜별로
    /// 분류합니다 (없음/손상/오래됨 = 누락).
    async fn scan_missing(
        &self,
        domain: &str,
        entity_id: Option<&str>,
        day_list: &[TradeDay],
        update_frequency_days: u32,
        now: &DateTime<Tz>,
    ) -> Result<Vec<FetchGap>> {
        let (Some(first), Some(last)) = (day_list.first(), day_list.last()) else {
            return Ok(Vec::new());
        };

        let cached: HashMap<TradeDay, CacheRecord> = self
            .get_range(domain, entity_id, *first, *last)
            .await?
            .into_iter()
            .map(|r| (r.date_key, r))
            .collect();

        Ok(collapse_gaps(day_list.iter().map(|day| {
            let covered = cached
                .get(day)
                .is_some_and(|r| is_fresh(r, update_frequency_days, now));
            (*day, covered)
        })))
    }
}

/// 저장된 행을 레코드로 복원합니다. 손상된 행은 경고 후 `None`.
pub(crate) fn decode_record(
    domain: &str,
    entity_id: Option<&str>,
    date_key: TradeDay,
    payload: &str,
    written_at_micros: i64,
) -> Option<CacheRecord> {
    let corrupt = |reason: String| {
        let err = DataError::CorruptRecord {
            domain: domain.to_string(),
            entity_id: entity_id.map(str::to_string),
            date_key,
            reason,
        };
        warn!(error = %err, "손상된 캐시 레코드, 누락으로 처리");
    };

    let payload = match serde_json::from_str::<Value>(payload) {
        Ok(value) => value,
        Err(e) => {
            corrupt(e.to_string());
            return None;
        }
    };
    let Some(written_at) = DateTime::<Utc>::from_timestamp_micros(written_at_micros) else {
        corrupt(format!("written_at out of range: {written_at_micros}"));
        return None;
    };

    Some(CacheRecord {
        domain: domain.to_string(),
        entity_id: entity_id.map(str::to_string),
        date_key,
        payload,
        written_at,
    })
}

/// 엔티티 키 (`None`은 빈 문자열로 저장).
pub(crate) fn entity_key(entity_id: Option<&str>) -> &str {
    entity_id.unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(v: u32) -> TradeDay {
        TradeDay::new(v).unwrap()
    }

    fn record_written(at: DateTime<Utc>) -> CacheRecord {
        CacheRecord {
            domain: "daily".into(),
            entity_id: None,
            date_key: d(20250102),
            payload: Value::Null,
            written_at: at,
        }
    }

    #[test]
    fn test_collapse_gaps() {
        let days = [20250102, 20250103, 20250106, 20250107, 20250108].map(d);
        let covered = [true, false, false, true, false];
        let gaps = collapse_gaps(days.into_iter().zip(covered));

        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[0].days, vec![d(20250103), d(20250106)]);
        assert_eq!(gaps[0].to_string(), "[20250103, 20250106]");
        assert_eq!(gaps[1], FetchGap::single(d(20250108)));
    }

    #[test]
    fn test_collapse_all_covered_or_missing() {
        let days = [20250102, 20250103].map(d);
        assert!(collapse_gaps(days.into_iter().map(|x| (x, true))).is_empty());

        let gaps = collapse_gaps(days.into_iter().map(|x| (x, false)));
        assert_eq!(gaps.len(), 1);
        assert_eq!((gaps[0].start, gaps[0].end), (d(20250102), d(20250103)));
    }

    #[test]
    fn test_freshness_boundary_is_strict() {
        let tz = chrono_tz::Asia::Shanghai;
        let record = record_written(Utc.with_ymd_and_hms(2025, 1, 2, 2, 0, 0).unwrap());

        let same_day = tz.with_ymd_and_hms(2025, 1, 2, 23, 0, 0).unwrap();
        let next_day = tz.with_ymd_and_hms(2025, 1, 3, 0, 30, 0).unwrap();
        let three_days = tz.with_ymd_and_hms(2025, 1, 5, 9, 0, 0).unwrap();

        assert!(is_fresh(&record, 1, &same_day));
        assert!(!is_fresh(&record, 1, &next_day));
        assert!(is_fresh(&record, 3, &next_day));
        assert!(!is_fresh(&record, 3, &three_days));
    }

    #[test]
    fn test_freshness_uses_now_timezone() {
        // 2025-01-02 17:00 UTC = 2025-01-03 01:00 Asia/Shanghai
        let record = record_written(Utc.with_ymd_and_hms(2025, 1, 2, 17, 0, 0).unwrap());
        let now = chrono_tz::Asia::Shanghai
            .with_ymd_and_hms(2025, 1, 3, 20, 0, 0)
            .unwrap();
        assert!(is_fresh(&record, 1, &now));

        let now_utc = Utc.with_ymd_and_hms(2025, 1, 3, 12, 0, 0).unwrap();
        assert!(!is_fresh(&record, 1, &now_utc));
    }

    #[test]
    fn test_zero_frequency_is_permanent() {
        let record = record_written(Utc.with_ymd_and_hms(1999, 1, 1, 0, 0, 0).unwrap());
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert!(is_fresh(&record, 0, &now));
        assert!(!is_fresh(&record, 365, &now));
    }

    #[test]
    fn test_validate_domain() {
        assert!(validate_domain("daily_bar").is_ok());
        assert!(validate_domain(&"a".repeat(64)).is_ok());
        assert!(validate_domain("").is_err());
        assert!(validate_domain(&"a".repeat(65)).is_err());
        assert!(matches!(
            validate_domain("daily; DROP TABLE x"),
            Err(DataError::InvalidDomain(_))
        ));
    }

    #[test]
    fn test_decode_record_corrupt_payload() {
        assert!(decode_record("daily", Some("000001"), d(20250102), "{not json", 0).is_none());
        let ok = decode_record("daily", Some("000001"), d(20250102), r#"{"close":1.5}"#, 0).unwrap();
        assert_eq!(ok.payload["close"], 1.5);
        assert_eq!(ok.entity_id.as_deref(), Some("000001"));
    }

    #[test]
    fn test_entity_key() {
        assert_eq!(entity_key(None), "");
        assert_eq!(entity_key(Some("000001")), "000001");
    }
}

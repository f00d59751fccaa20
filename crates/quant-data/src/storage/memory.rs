//! 프로세스 내 캐시 저장소.
//!
//! 페이로드를 직렬화된 문자열로 보관하므로 손상 레코드 처리 방식이 SQLite 저장소와
//! 같습니다.

use super::{
    decode_record, entity_key, validate_domain, CacheRecord, DomainStats,
    RangeCacheStore,
};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quant_core::{Clock, SystemClock, TradeDay};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredRow {
    payload: String,
    written_at_micros: i64,
}

/// 도메인 → (엔티티 키, 날짜) → 행
type DomainRows = BTreeMap<(String, TradeDay), StoredRow>;

/// 메모리 캐시 저장소.
pub struct MemoryRangeStore {
    domains: RwLock<HashMap<String, DomainRows>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryRangeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRangeStore {
    pub fn new() -> Self {
        Self {
            domains: RwLock::new(HashMap::new()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 직렬화된 페이로드를 그대로 기록합니다 (가져오기/복구용).
    pub async fn insert_raw(
        &self,
        domain: &str,
        entity_id: Option<&str>,
        date_key: TradeDay,
        payload: impl Into<String>,
        written_at_micros: i64,
    ) -> Result<()> {
        validate_domain(domain)?;
        let mut domains = self.domains.write().await;
        domains.entry(domain.to_string()).or_default().insert(
            (entity_key(entity_id).to_string(), date_key),
            StoredRow {
                payload: payload.into(),
                written_at_micros,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl RangeCacheStore for MemoryRangeStore {
    async fn get(
        &self,
        domain: &str,
        entity_id: Option<&str>,
        date_key: TradeDay,
    ) -> Result<Option<CacheRecord>> {
        validate_domain(domain)?;
        let domains = self.domains.read().await;
        let row = domains
            .get(domain)
            .and_then(|rows| rows.get(&(entity_key(entity_id).to_string(), date_key)));

        Ok(row.and_then(|r| {
            decode_record(domain, entity_id, date_key, &r.payload, r.written_at_micros)
        }))
    }

    async fn put(
        &self,
        domain: &str,
        entity_id: Option<&str>,
        date_key: TradeDay,
        payload: &Value,
    ) -> Result<()> {
        validate_domain(domain)?;
        let encoded = serde_json::to_string(payload)?;
        let written_at_micros = self.clock.now().timestamp_micros();

        let mut domains = self.domains.write().await;
        let rows = domains.entry(domain.to_string()).or_default();
        let key = (entity_key(entity_id).to_string(), date_key);

        match rows.get(&key) {
            Some(existing) if existing.written_at_micros > written_at_micros => {
                debug!(
                    domain,
                    date_key = %date_key,
                    "더 최신 레코드가 있어 쓰기 무시"
                );
            }
            _ => {
                rows.insert(
                    key,
                    StoredRow {
                        payload: encoded,
                        written_at_micros,
                    },
                );
            }
        }
        Ok(())
    }

    async fn get_range(
        &self,
        domain: &str,
        entity_id: Option<&str>,
        start: TradeDay,
        end: TradeDay,
    ) -> Result<Vec<CacheRecord>> {
        validate_domain(domain)?;
        if start > end {
            return Ok(Vec::new());
        }

        let domains = self.domains.read().await;
        let Some(rows) = domains.get(domain) else {
            return Ok(Vec::new());
        };

        let entity = entity_key(entity_id).to_string();
        Ok(rows
            .range((entity.clone(), start)..=(entity, end))
            .filter_map(|((_, day), row)| {
                decode_record(domain, entity_id, *day, &row.payload, row.written_at_micros)
            })
            .collect())
    }

    async fn stats(&self, domain: &str) -> Result<DomainStats> {
        validate_domain(domain)?;
        let domains = self.domains.read().await;
        let mut stats = DomainStats {
            domain: domain.to_string(),
            ..Default::default()
        };
        let Some(rows) = domains.get(domain) else {
            return Ok(stats);
        };

        let entities: HashSet<&str> = rows.keys().map(|(e, _)| e.as_str()).collect();
        stats.records = rows.len() as u64;
        stats.entities = entities.len() as u64;
        stats.first_date = rows.keys().map(|(_, d)| *d).min();
        stats.last_date = rows.keys().map(|(_, d)| *d).max();
        stats.oldest_write = rows
            .values()
            .map(|r| r.written_at_micros)
            .min()
            .and_then(DateTime::<Utc>::from_timestamp_micros);
        stats.newest_write = rows
            .values()
            .map(|r| r.written_at_micros)
            .max()
            .and_then(DateTime::<Utc>::from_timestamp_micros);
        Ok(stats)
    }

    async fn purge_entity(&self, domain: &str, entity_id: Option<&str>) -> Result<u64> {
        validate_domain(domain)?;
        let mut domains = self.domains.write().await;
        let Some(rows) = domains.get_mut(domain) else {
            return Ok(0);
        };
        let entity = entity_key(entity_id);
        let before = rows.len();
        rows.retain(|(e, _), _| e != entity);
        Ok((before - rows.len()) as u64)
    }

    async fn purge_domain(&self, domain: &str) -> Result<u64> {
        validate_domain(domain)?;
        let mut domains = self.domains.write().await;
        Ok(domains.remove(domain).map_or(0, |rows| rows.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FetchGap;
    use chrono::{Duration, TimeZone};
    use quant_core::ManualClock;
    use serde_json::json;

    fn d(v: u32) -> TradeDay {
        TradeDay::new(v).unwrap()
    }

    fn setup() -> (MemoryRangeStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 8, 2, 0, 0).unwrap(),
        ));
        (MemoryRangeStore::new().with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_put_get() {
        let (store, clock) = setup();
        store
            .put("daily", Some("000001"), d(20250102), &json!({"close": 10.5}))
            .await
            .unwrap();

        let record = store.get("daily", Some("000001"), d(20250102)).await.unwrap().unwrap();
        assert_eq!(record.payload, json!({"close": 10.5}));
        assert_eq!(record.written_at, clock.now());

        assert!(store.get("daily", None, d(20250102)).await.unwrap().is_none());
        assert!(store.get("daily", Some("000001"), d(20250103)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_later_put_supersedes() {
        let (store, clock) = setup();
        store.put("daily", None, d(20250102), &json!(1)).await.unwrap();
        clock.advance(Duration::hours(1));
        store.put("daily", None, d(20250102), &json!(2)).await.unwrap();

        let record = store.get("daily", None, d(20250102)).await.unwrap().unwrap();
        assert_eq!(record.payload, json!(2));
        assert_eq!(store.stats("daily").await.unwrap().records, 1);
    }

    #[tokio::test]
    async fn test_older_write_is_ignored() {
        let (store, clock) = setup();
        store.put("daily", None, d(20250102), &json!("new")).await.unwrap();
        clock.advance(Duration::hours(-2));
        store.put("daily", None, d(20250102), &json!("old")).await.unwrap();

        let record = store.get("daily", None, d(20250102)).await.unwrap().unwrap();
        assert_eq!(record.payload, json!("new"));
    }

    #[tokio::test]
    async fn test_corrupt_record_is_miss() {
        let (store, clock) = setup();
        store
            .insert_raw("daily", Some("000001"), d(20250103), "{broken", clock.now().timestamp_micros())
            .await
            .unwrap();
        store.put("daily", Some("000001"), d(20250102), &json!(1)).await.unwrap();

        assert!(store.get("daily", Some("000001"), d(20250103)).await.unwrap().is_none());

        let gaps = store
            .scan_missing(
                "daily",
                Some("000001"),
                &[d(20250102), d(20250103)],
                1,
                &clock.now().with_timezone(&chrono_tz::Asia::Shanghai),
            )
            .await
            .unwrap();
        assert_eq!(gaps, vec![FetchGap::single(d(20250103))]);
    }

    #[tokio::test]
    async fn test_scan_missing_staleness() {
        let (store, clock) = setup();
        store.put("daily", None, d(20250102), &json!(1)).await.unwrap();
        store.put("daily", None, d(20250103), &json!(2)).await.unwrap();
        let days = [d(20250102), d(20250103), d(20250106)];
        let tz = chrono_tz::Asia::Shanghai;

        let gaps = store
            .scan_missing("daily", None, &days, 1, &clock.now().with_timezone(&tz))
            .await
            .unwrap();
        assert_eq!(gaps, vec![FetchGap::single(d(20250106))]);

        clock.advance(Duration::days(1));
        let gaps = store
            .scan_missing("daily", None, &days, 1, &clock.now().with_timezone(&tz))
            .await
            .unwrap();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].days, days.to_vec());

        // 영구 보관 모드
        let gaps = store
            .scan_missing("daily", None, &days, 0, &clock.now().with_timezone(&tz))
            .await
            .unwrap();
        assert_eq!(gaps, vec![FetchGap::single(d(20250106))]);
    }

    #[tokio::test]
    async fn test_get_range_stats_and_purge() {
        let (store, _) = setup();
        for (entity, day) in [("A", 20250102), ("A", 20250103), ("B", 20250106)] {
            store.put("daily", Some(entity), d(day), &json!(day)).await.unwrap();
        }
        store.put("daily", None, d(20250107), &json!(0)).await.unwrap();

        let records = store
            .get_range("daily", Some("A"), d(20250101), d(20250131))
            .await
            .unwrap();
        assert_eq!(
            records.iter().map(|r| r.date_key).collect::<Vec<_>>(),
            vec![d(20250102), d(20250103)]
        );

        let stats = store.stats("daily").await.unwrap();
        assert_eq!(stats.records, 4);
        assert_eq!(stats.entities, 3);
        assert_eq!(stats.first_date, Some(d(20250102)));
        assert_eq!(stats.last_date, Some(d(20250107)));

        assert_eq!(store.purge_entity("daily", Some("A")).await.unwrap(), 2);
        assert_eq!(store.purge_domain("daily").await.unwrap(), 2);
        assert_eq!(store.stats("daily").await.unwrap().records, 0);
    }

    #[tokio::test]
    async fn test_invalid_domain_rejected() {
        let (store, _) = setup();
        assert!(store.put("bad-domain", None, d(20250102), &json!(1)).await.is_err());
        assert!(store.get("", None, d(20250102)).await.is_err());
    }
}

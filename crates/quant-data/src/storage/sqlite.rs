//! SQLite 캐시 저장소.
//!
//! 도메인마다 `range_cache_<domain>` 테이블을 하나씩 사용합니다. 테이블은 처음 접근할 때
//! 생성되고 이후에는 생성 여부를 기억합니다.
//!
//! ```text
//! entity_id  TEXT     NOT NULL   -- 엔티티 없음 = ''
//! date_key   INTEGER  NOT NULL   -- YYYYMMDD
//! payload    TEXT     NOT NULL   -- JSON
//! written_at INTEGER  NOT NULL   -- UTC 마이크로초
//! PRIMARY KEY (entity_id, date_key)
//! ```
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! use quant_data::storage::{RangeCacheStore, SqliteRangeStore};
//!
//! let store = SqliteRangeStore::connect("sqlite://cache/range_cache.db", 5).await?;
//! store.put("daily", Some("000001"), day, &payload).await?;
//! ```

use super::{decode_record, entity_key, validate_domain, CacheRecord, DomainStats, RangeCacheStore};
use crate::error::{DataError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quant_core::{Clock, SystemClock, TradeDay};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// SQLite 캐시 저장소.
pub struct SqliteRangeStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    /// 이미 생성한 테이블
    known_tables: RwLock<HashSet<String>>,
}

impl SqliteRangeStore {
    /// 데이터베이스에 연결합니다. 파일과 상위 디렉터리가 없으면 생성합니다.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| DataError::Storage(format!("failed to create dir: {e}")))?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        info!(url = database_url, "캐시 데이터베이스 연결");
        Ok(Self::from_pool(pool))
    }

    /// 기존 풀로 저장소를 생성합니다.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            clock: Arc::new(SystemClock),
            known_tables: RwLock::new(HashSet::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 도메인 테이블 이름을 반환하고, 필요하면 테이블을 생성합니다.
    async fn ensure_table(&self, domain: &str) -> Result<String> {
        validate_domain(domain)?;
        let table = table_name(domain);

        if self.known_tables.read().await.contains(&table) {
            return Ok(table);
        }

        let mut known = self.known_tables.write().await;
        if !known.contains(&table) {
            let ddl = format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    entity_id TEXT NOT NULL,
                    date_key INTEGER NOT NULL,
                    payload TEXT NOT NULL,
                    written_at INTEGER NOT NULL,
                    PRIMARY KEY (entity_id, date_key)
                )"
            );
            sqlx::query(&ddl).execute(&self.pool).await?;
            debug!(table = %table, "캐시 테이블 준비 완료");
            known.insert(table.clone());
        }
        Ok(table)
    }
}

/// 도메인 테이블 이름 (도메인은 검증된 식별자).
pub fn table_name(domain: &str) -> String {
    format!("range_cache_{domain}")
}

#[async_trait]
impl RangeCacheStore for SqliteRangeStore {
    async fn get(
        &self,
        domain: &str,
        entity_id: Option<&str>,
        date_key: TradeDay,
    ) -> Result<Option<CacheRecord>> {
        let table = self.ensure_table(domain).await?;
        let sql = format!("SELECT payload, written_at FROM {table} WHERE entity_id = ? AND date_key = ?");

        let row: Option<(String, i64)> = sqlx::query_as(&sql)
            .bind(entity_key(entity_id))
            .bind(i64::from(date_key.as_u32()))
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.and_then(|(payload, written_at)| {
            decode_record(domain, entity_id, date_key, &payload, written_at)
        }))
    }

    #[instrument(skip(self, payload))]
    async fn put(
        &self,
        domain: &str,
        entity_id: Option<&str>,
        date_key: TradeDay,
        payload: &Value,
    ) -> Result<()> {
        let table = self.ensure_table(domain).await?;
        let encoded = serde_json::to_string(payload)?;
        let written_at = self.clock.now().timestamp_micros();

        let sql = format!(
            "INSERT INTO {table} (entity_id, date_key, payload, written_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (entity_id, date_key) DO UPDATE SET
                payload = excluded.payload,
                written_at = excluded.written_at
             WHERE excluded.written_at >= {table}.written_at"
        );

        let result = sqlx::query(&sql)
            .bind(entity_key(entity_id))
            .bind(i64::from(date_key.as_u32()))
            .bind(encoded)
            .bind(written_at)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            debug!("더 최신 레코드가 있어 쓰기 무시");
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
        if start > end {
            validate_domain(domain)?;
            return Ok(Vec::new());
        }
        let table = self.ensure_table(domain).await?;
        let sql = format!(
            "SELECT date_key, payload, written_at FROM {table}
             WHERE entity_id = ? AND date_key BETWEEN ? AND ?
             ORDER BY date_key"
        );

        let rows: Vec<(i64, String, i64)> = sqlx::query_as(&sql)
            .bind(entity_key(entity_id))
            .bind(i64::from(start.as_u32()))
            .bind(i64::from(end.as_u32()))
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for (date_key, payload, written_at) in rows {
            let Some(day) = u32::try_from(date_key)
                .ok()
                .and_then(|v| TradeDay::new(v).ok())
            else {
                warn!(
                    domain,
                    entity = entity_id.unwrap_or("-"),
                    date_key,
                    "손상된 캐시 레코드(날짜 키), 누락으로 처리"
                );
                continue;
            };
            if let Some(record) = decode_record(domain, entity_id, day, &payload, written_at) {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn stats(&self, domain: &str) -> Result<DomainStats> {
        let table = self.ensure_table(domain).await?;
        let sql = format!(
            "SELECT COUNT(*), COUNT(DISTINCT entity_id), MIN(date_key), MAX(date_key),
                    MIN(written_at), MAX(written_at)
             FROM {table}"
        );

        let (records, entities, first, last, oldest, newest): (
            i64,
            i64,
            Option<i64>,
            Option<i64>,
            Option<i64>,
            Option<i64>,
        ) = sqlx::query_as(&sql).fetch_one(&self.pool).await?;

        let to_day = |v: Option<i64>| {
            v.and_then(|v| u32::try_from(v).ok())
                .and_then(|v| TradeDay::new(v).ok())
        };

        Ok(DomainStats {
            domain: domain.to_string(),
            records: records as u64,
            entities: entities as u64,
            first_date: to_day(first),
            last_date: to_day(last),
            oldest_write: oldest.and_then(DateTime::<Utc>::from_timestamp_micros),
            newest_write: newest.and_then(DateTime::<Utc>::from_timestamp_micros),
        })
    }

    #[instrument(skip(self))]
    async fn purge_entity(&self, domain: &str, entity_id: Option<&str>) -> Result<u64> {
        let table = self.ensure_table(domain).await?;
        let sql = format!("DELETE FROM {table} WHERE entity_id = ?");
        let result = sqlx::query(&sql)
            .bind(entity_key(entity_id))
            .execute(&self.pool)
            .await?;

        info!(deleted = result.rows_affected(), "캐시 엔티티 삭제");
        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn purge_domain(&self, domain: &str) -> Result<u64> {
        let table = self.ensure_table(domain).await?;
        let sql = format!("DELETE FROM {table}");
        let result = sqlx::query(&sql).execute(&self.pool).await?;

        info!(deleted = result.rows_affected(), "캐시 도메인 삭제");
        Ok(result.rows_affected())
    }
}

//! 거래일 달력 인덱스.
//!
//! # 동작 흐름
//!
//! ```text
//! load()
//!   │
//!   ├─ 메모리에 스냅샷 없음 → 스냅샷 파일 읽기 (버전 불일치 = 없음)
//!   │
//!   ├─ fetched_at == 오늘 → 완료
//!   │
//!   └─ refresh(force = false)
//!         │
//!         ├─ 소스 조회 성공 → 정렬/중복 제거 → 파일 저장 → Arc 교체
//!         └─ 소스 조회 실패 → 기존 스냅샷 유지 (최초 구축이면 CalendarUnavailable)
//! ```
//!
//! 조회는 현재 설치된 스냅샷의 `Arc`를 복제해 사용하므로 갱신 중에도 막히지 않으며,
//! 항상 완전한 이전 스냅샷 또는 완전한 새 스냅샷만 관찰합니다.

use super::persist::SnapshotFile;
use super::snapshot::CalendarSnapshot;
use super::source::{CalendarDay, CalendarSource};
use crate::error::{DataError, Result};
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use quant_core::{Clock, SystemClock, TradeDay};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// 거래일 달력 인덱스.
pub struct TradingCalendar {
    source: Arc<dyn CalendarSource>,
    snapshot_file: Option<SnapshotFile>,
    clock: Arc<dyn Clock>,
    timezone: Tz,
    history_start: TradeDay,
    /// 현재 설치된 스냅샷 (포인터 교체 시에만 쓰기 잠금)
    current: RwLock<Option<Arc<CalendarSnapshot>>>,
    /// load/refresh 직렬화
    refresh_lock: Mutex<()>,
}

impl TradingCalendar {
    /// 새 달력 인덱스를 생성합니다. 스냅샷은 `load()` 전까지 비어 있습니다.
    pub fn new(source: Arc<dyn CalendarSource>) -> Self {
        let history_start = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or_default();
        Self {
            source,
            snapshot_file: None,
            clock: Arc::new(SystemClock),
            timezone: chrono_tz::Asia::Shanghai,
            history_start: TradeDay::from_date(history_start),
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// 스냅샷 파일 경로 설정.
    pub fn with_snapshot_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_file = Some(SnapshotFile::new(path));
        self
    }

    /// 시계 설정.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// "오늘" 판단에 사용할 시장 시간대 설정.
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// 달력 이력 시작일 설정.
    pub fn with_history_start(mut self, start: TradeDay) -> Self {
        self.history_start = start;
        self
    }

    /// 시장 시간대 기준 오늘.
    pub fn today(&self) -> TradeDay {
        quant_core::today(self.clock.as_ref(), &self.timezone)
    }

    /// 시장 시간대 기준 현재 시각.
    pub fn now(&self) -> DateTime<Tz> {
        self.clock.now().with_timezone(&self.timezone)
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// 현재 스냅샷. 한 번도 구축되지 않았으면 `CalendarUnavailable`.
    pub fn snapshot(&self) -> Result<Arc<CalendarSnapshot>> {
        self.installed()
            .ok_or_else(|| DataError::CalendarUnavailable("calendar not loaded".into()))
    }

    fn installed(&self) -> Option<Arc<CalendarSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn install(&self, snapshot: CalendarSnapshot) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(Arc::new(snapshot));
    }

    /// 스냅샷이 없을 때만 `load()`를 수행합니다.
    pub async fn ensure_loaded(&self) -> Result<Arc<CalendarSnapshot>> {
        if let Some(snapshot) = self.installed() {
            return Ok(snapshot);
        }
        self.load().await?;
        self.snapshot()
    }

    /// 저장된 스냅샷을 읽고, 오늘 조회된 것이 아니면 갱신합니다.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;

        if self.installed().is_none() {
            if let Some(file) = &self.snapshot_file {
                if let Some(snapshot) = file.read().await {
                    info!(
                        path = %file.path().display(),
                        days = snapshot.len(),
                        fetched_at = %snapshot.fetched_at(),
                        "저장된 거래일 스냅샷 로드"
                    );
                    self.install(snapshot);
                }
            }
        }

        self.refresh_locked(false).await
    }

    /// 달력 소스에서 전체 이력을 다시 조회합니다.
    ///
    /// `force == false`이면 오늘 이미 조회한 스냅샷은 그대로 둡니다.
    /// 소스 조회가 실패하면 기존 스냅샷을 유지하고 `Ok`를 반환하며,
    /// 스냅샷이 한 번도 구축되지 않은 경우에만 `CalendarUnavailable`을 반환합니다.
    #[instrument(skip(self))]
    pub async fn refresh(&self, force: bool) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked(force).await
    }

    async fn refresh_locked(&self, force: bool) -> Result<()> {
        let today = self.today();
        let previous = self.installed();

        if !force {
            if let Some(snapshot) = previous.as_ref().filter(|s| s.fetched_at() == today) {
                debug!(fetched_at = %snapshot.fetched_at(), "거래일 스냅샷이 이미 최신");
                return Ok(());
            }
        }

        let rows = match self
            .source
            .fetch_trading_days(self.history_start, today)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                return match previous {
                    Some(snapshot) => {
                        warn!(
                            source = self.source.name(),
                            error = %e,
                            stale_fetched_at = %snapshot.fetched_at(),
                            "거래일 달력 갱신 실패, 기존 스냅샷 유지"
                        );
                        Ok(())
                    }
                    None => Err(DataError::CalendarUnavailable(e.to_string())),
                };
            }
        };

        let snapshot = CalendarSnapshot::from_days(
            rows.into_iter().filter(|r| r.is_open).map(|r| r.date),
            today,
        );

        if snapshot.is_empty() {
            warn!(source = self.source.name(), "달력 소스가 거래일을 반환하지 않음");
        }

        if let Some(file) = &self.snapshot_file {
            if let Err(e) = file.write(&snapshot).await {
                warn!(error = %e, "거래일 스냅샷 저장 실패, 메모리 스냅샷만 교체");
            }
        }

        info!(
            source = self.source.name(),
            days = snapshot.len(),
            first = ?snapshot.first(),
            last = ?snapshot.last(),
            "거래일 스냅샷 갱신 완료"
        );
        self.install(snapshot);
        Ok(())
    }

    /// 거래일 여부.
    pub fn is_trading_day(&self, day: TradeDay) -> Result<bool> {
        Ok(self.snapshot()?.contains(day))
    }

    /// 엄격한 이전 거래일 (마지막 거래일 이후는 마지막 거래일로 고정).
    pub fn previous_trading_day(&self, day: TradeDay) -> Result<Option<TradeDay>> {
        self.snapshot()?.previous(day)
    }

    /// 엄격한 다음 거래일.
    pub fn next_trading_day(&self, day: TradeDay) -> Result<Option<TradeDay>> {
        self.snapshot()?.next(day)
    }

    /// `day`가 거래일이면 그대로, 아니면 이전 거래일.
    pub fn nearest_or_previous(&self, day: TradeDay) -> Result<Option<TradeDay>> {
        self.snapshot()?.nearest_or_previous(day)
    }

    /// `[start, end]` 구간의 거래일.
    pub fn days_in_range(&self, start: TradeDay, end: TradeDay) -> Result<Vec<TradeDay>> {
        Ok(self.snapshot()?.range(start, end)?.to_vec())
    }

    /// 기준일 직전 거래일 `n`개.
    pub fn recent_n_before(&self, day: TradeDay, n: usize) -> Result<Vec<TradeDay>> {
        Ok(self.snapshot()?.recent_n_before(day, n)?.to_vec())
    }

    /// 스냅샷을 거치지 않고 소스의 달력 행을 그대로 조회합니다.
    pub async fn trading_days_info(&self, start: TradeDay, end: TradeDay) -> Result<Vec<CalendarDay>> {
        self.source.fetch_trading_days(start, end).await
    }
}

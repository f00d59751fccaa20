//! 거래일 스냅샷 파일 저장소.
//!
//! 형식은 버전이 명시된 JSON입니다:
//!
//! ```text
//! {"format":"trade-calendar","version":2,"fetched_at":20250108,"days":[20250102, ...]}
//! ```
//!
//! 형식/버전이 다르거나 파싱할 수 없는 파일은 "없음"으로 취급되어 재구축을 유발합니다.
//! 쓰기는 `.tmp` 파일에 기록한 뒤 rename 하여 원자적으로 교체합니다.

use super::snapshot::CalendarSnapshot;
use crate::error::{DataError, Result};
use quant_core::TradeDay;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 파일 형식 식별자.
const SNAPSHOT_FORMAT: &str = "trade-calendar";

/// 현재 스냅샷 스키마 버전.
pub const SNAPSHOT_VERSION: u32 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFileV2 {
    format: String,
    version: u32,
    fetched_at: TradeDay,
    days: Vec<TradeDay>,
}

/// 스냅샷 파일 핸들.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 스냅샷을 읽습니다. 없거나 호환되지 않으면 `None`.
    pub async fn read(&self) -> Option<CalendarSnapshot> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "스냅샷 파일 없음");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "스냅샷 파일 읽기 실패");
                return None;
            }
        };

        decode(&bytes)
            .map_err(|reason| {
                warn!(path = %self.path.display(), reason = %reason, "호환되지 않는 스냅샷, 재구축 필요");
            })
            .ok()
    }

    /// 스냅샷을 원자적으로 기록합니다.
    pub async fn write(&self, snapshot: &CalendarSnapshot) -> Result<()> {
        let body = encode(snapshot)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| DataError::Snapshot(format!("failed to create dir: {e}")))?;
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, body)
            .await
            .map_err(|e| DataError::Snapshot(format!("failed to write temp file: {e}")))?;

        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(DataError::Snapshot(format!("atomic rename failed: {e}")));
        }

        debug!(
            path = %self.path.display(),
            days = snapshot.len(),
            fetched_at = %snapshot.fetched_at(),
            "스냅샷 저장 완료"
        );
        Ok(())
    }
}

fn encode(snapshot: &CalendarSnapshot) -> Result<Vec<u8>> {
    let file = SnapshotFileV2 {
        format: SNAPSHOT_FORMAT.to_string(),
        version: SNAPSHOT_VERSION,
        fetched_at: snapshot.fetched_at(),
        days: snapshot.days().to_vec(),
    };
    Ok(serde_json::to_vec(&file)?)
}

fn decode(bytes: &[u8]) -> std::result::Result<CalendarSnapshot, String> {
    // 버전 필드를 먼저 확인해 스키마가 다른 파일을 구분합니다.
    let header: serde_json::Value = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
    let format = header.get("format").and_then(|v| v.as_str());
    let version = header.get("version").and_then(|v| v.as_u64());
    if format != Some(SNAPSHOT_FORMAT) || version != Some(SNAPSHOT_VERSION as u64) {
        return Err(format!("format={:?}, version={:?}", format, version));
    }

    let file: SnapshotFileV2 = serde_json::from_value(header).map_err(|e| e.to_string())?;
    CalendarSnapshot::from_sorted(file.days, file.fetched_at)
        .ok_or_else(|| "days not strictly increasing".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(v: u32) -> TradeDay {
        TradeDay::new(v).unwrap()
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("nested/calendar.json"));
        let snapshot = CalendarSnapshot::from_days([d(20250102), d(20250103)], d(20250103));

        file.write(&snapshot).await.unwrap();
        assert_eq!(file.read().await, Some(snapshot));
        assert!(!dir.path().join("nested/calendar.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("none.json"));
        assert_eq!(file.read().await, None);
    }

    #[tokio::test]
    async fn test_version_mismatch_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calendar.json");
        tokio::fs::write(
            &path,
            r#"{"format":"trade-calendar","version":1,"fetched_at":20250103,"days":[20250102]}"#,
        )
        .await
        .unwrap();

        assert_eq!(SnapshotFile::new(&path).read().await, None);
    }

    #[tokio::test]
    async fn test_garbage_and_unsorted_are_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calendar.json");

        tokio::fs::write(&path, b"\x80\x03pickle").await.unwrap();
        assert_eq!(SnapshotFile::new(&path).read().await, None);

        tokio::fs::write(
            &path,
            r#"{"format":"trade-calendar","version":2,"fetched_at":20250103,"days":[20250103,20250102]}"#,
        )
        .await
        .unwrap();
        assert_eq!(SnapshotFile::new(&path).read().await, None);
    }
}

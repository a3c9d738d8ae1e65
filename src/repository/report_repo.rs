// ==========================================
// 救灾物资调配系统 - 灾情报告数据仓储
// ==========================================
// 对齐: disaster_allocations_report.json (嵌套结构,见 domain::disaster)
// 实现:
// - JsonReportStore: JSON 文件 (生产)
// - InMemoryReportStore: 内存实现 (测试)
// 红线: 读改写整体由调用方串行化,本层只负责整文件读写
// ==========================================

use crate::domain::disaster::DisasterReport;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

// ==========================================
// Trait: DisasterReportStore
// ==========================================
#[async_trait]
pub trait DisasterReportStore: Send + Sync {
    /// 读取完整报告
    async fn load(&self) -> RepositoryResult<DisasterReport>;

    /// 覆盖写入完整报告
    async fn save(&self, report: &DisasterReport) -> RepositoryResult<()>;
}

// ==========================================
// JsonReportStore - JSON 文件报告仓储
// ==========================================
#[derive(Debug, Clone)]
pub struct JsonReportStore {
    path: PathBuf,
}

impl JsonReportStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl DisasterReportStore for JsonReportStore {
    async fn load(&self) -> RepositoryResult<DisasterReport> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RepositoryError::NotFound {
                    entity: "disaster_report".to_string(),
                    id: self.path.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let report: DisasterReport = serde_json::from_str(&content)?;
        debug!(
            path = %self.path.display(),
            total_disasters = report.total_disasters,
            "灾情报告已读取"
        );
        Ok(report)
    }

    async fn save(&self, report: &DisasterReport) -> RepositoryResult<()> {
        let content = serde_json::to_string_pretty(report)?;

        // 先写临时文件再 rename,避免读者看到半截文件
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        debug!(
            path = %self.path.display(),
            total_disasters = report.total_disasters,
            "灾情报告已写回"
        );
        Ok(())
    }
}

// ==========================================
// InMemoryReportStore - 内存报告仓储
// ==========================================
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    report: Mutex<DisasterReport>,
}

impl InMemoryReportStore {
    pub fn new(report: DisasterReport) -> Self {
        Self {
            report: Mutex::new(report),
        }
    }
}

#[async_trait]
impl DisasterReportStore for InMemoryReportStore {
    async fn load(&self) -> RepositoryResult<DisasterReport> {
        let report = self
            .report
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        Ok(report.clone())
    }

    async fn save(&self, report: &DisasterReport) -> RepositoryResult<()> {
        let mut current = self
            .report
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        *current = report.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::disaster::NeedLookup;
    use tempfile::TempDir;

    const REPORT_JSON: &str = r#"{
        "countries": {
            "Chile": {
                "total_disasters": 1,
                "disasters": {
                    "wildfire": {
                        "title": "Valparaiso fires",
                        "severity": 72,
                        "supplies": {"food": 12.5, "water": 30, "medicine": 4, "shelter": 2}
                    }
                }
            }
        },
        "total_disasters": 1
    }"#;

    #[tokio::test]
    async fn test_json_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        tokio::fs::write(&path, REPORT_JSON).await.unwrap();

        let store = JsonReportStore::new(&path);
        let mut report = store.load().await.unwrap();
        let NeedLookup::Found(mut need) = report.find_need("Chile-wildfire") else {
            panic!("Chile-wildfire missing from saved report");
        };
        assert_eq!(need.remaining.food, 12.5);

        need.remaining.water = 0.0;
        assert!(report.write_back(&need, false));
        store.save(&report).await.unwrap();

        let reloaded = store.load().await.unwrap();
        assert_eq!(reloaded, report);
        assert!(!store.temp_path().exists());

        // 两空格缩进的可读格式
        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(raw.contains("\n  \"countries\""));
    }

    #[tokio::test]
    async fn test_json_store_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = JsonReportStore::new(dir.path().join("absent.json"));
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_json_store_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let err = JsonReportStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, RepositoryError::SerializationError(_)));
    }
}

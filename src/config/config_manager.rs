// ==========================================
// 救灾物资调配系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// 配置键
pub mod config_keys {
    /// 灾情报告文件路径
    pub const REPORT_PATH: &str = "report_path";
    /// 分配冲突时的最大尝试次数（含首次）
    pub const ALLOCATION_MAX_ATTEMPTS: &str = "allocation_max_attempts";
    /// 临期预警窗口（天）
    pub const EXPIRING_SOON_DAYS: &str = "expiring_soon_days";
}

/// 默认值
pub mod config_defaults {
    pub const REPORT_PATH: &str = "disaster_allocations_report.json";
    pub const ALLOCATION_MAX_ATTEMPTS: u32 = 3;
    pub const EXPIRING_SOON_DAYS: i64 = 30;
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        tracing::info!(config_key = key, value, "配置已更新");
        Ok(())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> RepositoryResult<String> {
        Ok(self
            .get_global_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有 global 配置的快照
    pub fn get_config_snapshot(&self) -> RepositoryResult<BTreeMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut snapshot = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            snapshot.insert(key, value);
        }
        Ok(snapshot)
    }

    // ==========================================
    // 业务配置
    // ==========================================

    /// 灾情报告文件路径
    pub fn get_report_path(&self) -> RepositoryResult<String> {
        self.get_config_or_default(config_keys::REPORT_PATH, config_defaults::REPORT_PATH)
    }

    /// 分配最大尝试次数（至少 1）
    pub fn get_allocation_max_attempts(&self) -> RepositoryResult<u32> {
        let raw = self.get_global_config_value(config_keys::ALLOCATION_MAX_ATTEMPTS)?;
        Ok(parse_or_warn(
            config_keys::ALLOCATION_MAX_ATTEMPTS,
            raw,
            config_defaults::ALLOCATION_MAX_ATTEMPTS,
        )
        .max(1))
    }

    /// 临期预警窗口（天,不小于 0）
    pub fn get_expiring_soon_days(&self) -> RepositoryResult<i64> {
        let raw = self.get_global_config_value(config_keys::EXPIRING_SOON_DAYS)?;
        Ok(parse_or_warn(
            config_keys::EXPIRING_SOON_DAYS,
            raw,
            config_defaults::EXPIRING_SOON_DAYS,
        )
        .max(0))
    }
}

fn parse_or_warn<T: std::str::FromStr + Copy>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(value) => value.trim().parse::<T>().unwrap_or_else(|_| {
            tracing::warn!(config_key = key, raw_value = %value, "配置格式错误，使用默认值");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = setup();
        assert_eq!(config.get_report_path().unwrap(), "disaster_allocations_report.json");
        assert_eq!(config.get_allocation_max_attempts().unwrap(), 3);
        assert_eq!(config.get_expiring_soon_days().unwrap(), 30);
        assert!(config.get_config_snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_override_and_snapshot() {
        let config = setup();
        config
            .set_global_config_value(config_keys::ALLOCATION_MAX_ATTEMPTS, "5")
            .unwrap();
        config
            .set_global_config_value(config_keys::ALLOCATION_MAX_ATTEMPTS, "7")
            .unwrap();
        assert_eq!(config.get_allocation_max_attempts().unwrap(), 7);

        let snapshot = config.get_config_snapshot().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[config_keys::ALLOCATION_MAX_ATTEMPTS], "7");
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let config = setup();
        config
            .set_global_config_value(config_keys::EXPIRING_SOON_DAYS, "soon")
            .unwrap();
        config
            .set_global_config_value(config_keys::ALLOCATION_MAX_ATTEMPTS, "0")
            .unwrap();
        assert_eq!(config.get_expiring_soon_days().unwrap(), 30);
        assert_eq!(config.get_allocation_max_attempts().unwrap(), 1);
    }
}

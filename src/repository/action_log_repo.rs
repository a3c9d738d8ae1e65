// ==========================================
// 救灾物资调配系统 - 分配操作日志数据仓储
// ==========================================
// 对齐: allocation_log 表
// 红线: 所有写入必须记录
// ==========================================

use crate::domain::action_log::ActionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    /// 创建新的操作日志仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入操作日志
    ///
    /// # 返回
    /// - `Ok(action_id)`: 成功插入,返回action_id
    /// - `Err(...)`: 数据库错误
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO allocation_log (
                action_id, action_type, action_ts, actor, disaster_id,
                payload_json, result_json, detail
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                log.action_id,
                log.action_type,
                log.action_ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                log.actor,
                log.disaster_id,
                log.payload_json.as_ref().map(|v| v.to_string()),
                log.result_json.as_ref().map(|v| v.to_string()),
                log.detail,
            ],
        )?;

        Ok(log.action_id.clone())
    }

    /// 查询某灾情的操作日志（按时间升序）
    pub fn find_by_disaster(&self, disaster_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, action_type, action_ts, actor, disaster_id,
                   payload_json, result_json, detail
            FROM allocation_log
            WHERE disaster_id = ?1
            ORDER BY action_ts, rowid
            "#,
        )?;
        let logs = stmt
            .query_map(params![disaster_id], map_action_log)?
            .collect::<SqliteResult<Vec<ActionLog>>>()?;
        Ok(logs)
    }

    /// 查询最近的操作日志（按时间倒序）
    pub fn find_recent(&self, limit: usize) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, action_type, action_ts, actor, disaster_id,
                   payload_json, result_json, detail
            FROM allocation_log
            ORDER BY action_ts DESC, rowid DESC
            LIMIT ?1
            "#,
        )?;
        let logs = stmt
            .query_map(params![limit as i64], map_action_log)?
            .collect::<SqliteResult<Vec<ActionLog>>>()?;
        Ok(logs)
    }
}

fn map_action_log(row: &Row<'_>) -> SqliteResult<ActionLog> {
    let action_ts: String = row.get(2)?;
    let payload_json: Option<String> = row.get(5)?;
    let result_json: Option<String> = row.get(6)?;

    Ok(ActionLog {
        action_id: row.get(0)?,
        action_type: row.get(1)?,
        action_ts: NaiveDateTime::parse_from_str(&action_ts, "%Y-%m-%d %H:%M:%S")
            .unwrap_or_default(),
        actor: row.get(3)?,
        disaster_id: row.get(4)?,
        payload_json: payload_json.and_then(|s| serde_json::from_str(&s).ok()),
        result_json: result_json.and_then(|s| serde_json::from_str(&s).ok()),
        detail: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action_log::ActionType;
    use chrono::Utc;
    use serde_json::json;

    fn setup_repo() -> ActionLogRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        ActionLogRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn log(action_id: &str, disaster_id: Option<&str>) -> ActionLog {
        ActionLog {
            action_id: action_id.to_string(),
            action_type: ActionType::Allocate.as_str().to_string(),
            action_ts: Utc::now().naive_utc(),
            actor: "coordinator".to_string(),
            disaster_id: disaster_id.map(str::to_string),
            payload_json: Some(json!({"water": 15.0})),
            result_json: None,
            detail: Some("water 15/15".to_string()),
        }
    }

    #[test]
    fn test_insert_and_query() {
        let repo = setup_repo();
        repo.insert(&log("a1", Some("India-flood"))).unwrap();
        repo.insert(&log("a2", Some("India-flood"))).unwrap();
        repo.insert(&log("a3", None)).unwrap();

        let logs = repo.find_by_disaster("India-flood").unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].action_id, "a1");
        assert_eq!(logs[0].payload_json, Some(json!({"water": 15.0})));

        let recent = repo.find_recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].action_id, "a3");
    }
}

// ==========================================
// 救灾物资调配系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 生命周期: new() 打开共享连接并建表 -> 使用 -> shutdown() 显式关闭
// ==========================================

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::{AllocationApi, ApiError, ApiResult, SupplyApi};
use crate::config::config_manager::{config_keys, ConfigManager};
use crate::repository::{
    action_log_repo::ActionLogRepository,
    inventory_repo::{InventoryStore, SupplyLotRepository},
    report_repo::{DisasterReportStore, JsonReportStore},
};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "RELIEF_ALLOCATION_DB_PATH";

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 灾情报告文件路径
    pub report_path: PathBuf,

    /// 物资分配API
    pub allocation_api: Arc<AllocationApi>,

    /// 库存批次API
    pub supply_api: Arc<SupplyApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,

    conn: Arc<Mutex<Connection>>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开共享连接并初始化表结构
    /// 2. 初始化所有Repository
    /// 3. 按配置创建灾情报告仓储与所有API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::open(db_path, None)
    }

    /// 创建AppState并覆写灾情报告路径（写入 config_kv,后续启动沿用）
    pub fn with_report_path(db_path: String, report_path: &str) -> Result<Self, String> {
        Self::open(db_path, Some(report_path))
    }

    fn open(db_path: String, report_path_override: Option<&str>) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = crate::db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        crate::db::init_schema(&conn).map_err(|e| format!("数据库表结构初始化失败: {}", e))?;
        let schema_version = crate::db::read_schema_version(&conn)
            .map_err(|e| format!("无法读取数据库版本: {}", e))?;
        if let Some(version) = schema_version {
            // 由更新版本程序写入的数据库拒绝打开
            if version > crate::db::CURRENT_SCHEMA_VERSION {
                return Err(format!(
                    "数据库版本{}高于程序支持的版本{}",
                    version,
                    crate::db::CURRENT_SCHEMA_VERSION
                ));
            }
        }
        tracing::debug!(schema_version = ?schema_version, "数据库版本检查通过");
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 配置
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        if let Some(path) = report_path_override {
            config_manager
                .set_global_config_value(config_keys::REPORT_PATH, path)
                .map_err(|e| format!("无法写入报告路径配置: {}", e))?;
        }
        let report_path = PathBuf::from(
            config_manager
                .get_report_path()
                .map_err(|e| format!("无法读取报告路径配置: {}", e))?,
        );
        let max_attempts = config_manager
            .get_allocation_max_attempts()
            .map_err(|e| format!("无法读取分配重试配置: {}", e))?;

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let lot_repo = Arc::new(SupplyLotRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));
        let report_store: Arc<dyn DisasterReportStore> =
            Arc::new(JsonReportStore::new(report_path.clone()));

        // ==========================================
        // 初始化API层
        // ==========================================
        let inventory: Arc<dyn InventoryStore> = lot_repo.clone();
        let allocation_api = Arc::new(AllocationApi::new(
            inventory,
            report_store,
            Some(action_log_repo.clone()),
            max_attempts,
        ));
        let supply_api = Arc::new(SupplyApi::new(
            lot_repo,
            Some(action_log_repo.clone()),
            config_manager.clone(),
        ));

        tracing::info!(
            report_path = %report_path.display(),
            max_attempts,
            "AppState初始化完成"
        );

        Ok(Self {
            db_path,
            report_path,
            allocation_api,
            supply_api,
            config_manager,
            action_log_repo,
            conn,
        })
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }

    /// 显式关闭
    ///
    /// 先释放全部API与仓储,再关闭共享连接。
    /// 若调用方仍持有某个API的克隆,返回错误且连接保持打开。
    pub fn shutdown(self) -> ApiResult<()> {
        let AppState {
            db_path,
            allocation_api,
            supply_api,
            config_manager,
            action_log_repo,
            conn,
            ..
        } = self;
        drop(allocation_api);
        drop(supply_api);
        drop(config_manager);
        drop(action_log_repo);

        let conn = Arc::try_unwrap(conn).map_err(|_| {
            ApiError::InternalError("数据库连接仍被其他组件引用，无法关闭".to_string())
        })?;
        let conn = conn
            .into_inner()
            .map_err(|e| ApiError::DatabaseConnectionError(format!("数据库锁已中毒: {}", e)))?;
        conn.close()
            .map_err(|(_, e)| ApiError::DatabaseError(format!("关闭数据库失败: {}", e)))?;

        tracing::info!("AppState已关闭，数据库: {}", db_path);
        Ok(())
    }
}

/// 获取默认数据库路径
///
/// 优先使用环境变量 RELIEF_ALLOCATION_DB_PATH,否则使用用户数据目录
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./relief_allocation.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("relief-allocation");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("relief_allocation.db");
        }
    }
    path.to_string_lossy().to_string()
}

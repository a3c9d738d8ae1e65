// ==========================================
// 救灾物资调配系统 - 应用层
// ==========================================
// 职责: 组装仓储/引擎/API,管理存储句柄生命周期
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState, DB_PATH_ENV};

// ==========================================
// 救灾物资调配系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽存储细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod action_log_repo;
pub mod error;
pub mod inventory_repo;
pub mod report_repo;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use inventory_repo::{
    InMemoryInventory, InventorySnapshotReader, InventoryStore, InventoryWriter,
    SupplyLotRepository,
};
pub use report_repo::{DisasterReportStore, InMemoryReportStore, JsonReportStore};

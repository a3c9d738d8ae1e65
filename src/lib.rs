// ==========================================
// 救灾物资调配系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + JSON 灾情报告
// 系统定位: 物资分配决策核心 (先到期先分配)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 分配规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装与生命周期
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AllocationStatus, SeverityLevel, SupplyCategory};

// 领域实体
pub use domain::{
    ActionLog, ActionType, AllocationPlan, AllocationRequest, CategoryAllocation, DisasterKey,
    DisasterNeed, DisasterReport, InventoryLot, LotDeduction, SupplyLot,
};

// 引擎
pub use engine::{AllocationEngine, EngineError, NeedPrioritySorter};

// 仓储
pub use repository::{
    DisasterReportStore, InMemoryInventory, InMemoryReportStore, InventorySnapshotReader,
    InventoryWriter, JsonReportStore, RepositoryError, SupplyLotRepository,
};

// API
pub use api::{AllocationApi, AllocationOutcome, ApiError, ApiResult, SupplyApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "救灾物资调配系统";

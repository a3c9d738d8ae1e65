// ==========================================
// 救灾物资调配系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod allocation;
pub mod disaster;
pub mod inventory;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use allocation::{AllocationPlan, AllocationRequest, CategoryAllocation, LotDeduction};
pub use disaster::{
    CountryReport, DisasterEntry, DisasterKey, DisasterNeed, DisasterReport, NeedLookup,
};
pub use inventory::{CategorySummary, InventoryLot, NewSupplyLot, SupplyLot, SupplyLotUpdate};
pub use types::{AllocationStatus, SeverityLevel, SupplyCategory};

// ==========================================
// 救灾物资调配系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供命令行与集成方调用
// ==========================================

pub mod allocation_api;
pub mod error;
pub mod supply_api;

// 重导出核心类型
pub use allocation_api::{AllocationApi, AllocationOutcome, AllocationPreview};
pub use error::{ApiError, ApiResult};
pub use supply_api::SupplyApi;

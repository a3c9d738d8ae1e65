// ==========================================
// 救灾物资调配系统 - 引擎层
// ==========================================
// 职责: 实现分配规则,不拼 SQL,不做 I/O
// 红线: 引擎无状态,可被并发调用
// ==========================================

pub mod allocation;
pub mod error;
pub mod priority;

// 重导出核心引擎
pub use allocation::AllocationEngine;
pub use error::{EngineError, EngineResult};
pub use priority::NeedPrioritySorter;

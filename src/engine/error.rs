// ==========================================
// 救灾物资调配系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 红线: 输入异常必须显式上报,不做静默截断
// ==========================================

use crate::domain::types::SupplyCategory;
use thiserror::Error;

/// 分配引擎错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// 请求数量为负数或非有限值
    #[error("无效的分配请求: category={category}, quantity={quantity}")]
    InvalidRequest {
        category: SupplyCategory,
        quantity: f64,
    },

    /// 库存快照中存在负数量批次（上游数据完整性故障）
    #[error("库存数据不一致: lot_id={lot_id}, quantity={quantity}")]
    InventoryInconsistency { lot_id: String, quantity: f64 },
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;

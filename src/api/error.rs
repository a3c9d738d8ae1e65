// ==========================================
// 救灾物资调配系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository/Engine错误为调用方可区分的错误
// 红线: 所有错误均可恢复,不导致进程退出
// ==========================================

use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 分配输入错误
    // ==========================================
    /// 请求数量为负数/非有限值
    #[error("无效的分配请求: {0}")]
    InvalidRequest(String),

    /// 库存快照中存在负数量批次（上游数据完整性故障）
    #[error("库存数据不一致: {0}")]
    InventoryInconsistency(String),

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("乐观锁冲突: {0}")]
    OptimisticLockFailure(String),

    /// 多次重试后库存快照仍然过期
    #[error("分配并发冲突: 已尝试{attempts}次, 最后错误: {message}")]
    ConcurrencyConflict { attempts: u32, message: String },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("灾情报告读写失败: {0}")]
    ReportStoreError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 并发控制错误
            RepositoryError::OptimisticLockFailure {
                entity_id,
                expected,
                actual,
            } => ApiError::OptimisticLockFailure(format!(
                "{}已被其他写入者修改（期望revision={}，实际revision={}）",
                entity_id, expected, actual
            )),
            RepositoryError::InsufficientQuantity { lot_id, requested } => {
                ApiError::OptimisticLockFailure(format!(
                    "批次{}数量已不足以扣减{}",
                    lot_id, requested
                ))
            }

            // 数据库错误
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::InvalidInput(format!("唯一约束违反: {}", msg))
            }

            // 文件错误
            RepositoryError::FileIoError(msg) | RepositoryError::SerializationError(msg) => {
                ApiError::ReportStoreError(msg)
            }
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidRequest { category, quantity } => ApiError::InvalidRequest(
                format!("category={}, quantity={}", category, quantity),
            ),
            EngineError::InventoryInconsistency { lot_id, quantity } => {
                ApiError::InventoryInconsistency(format!("lot_id={}, quantity={}", lot_id, quantity))
            }
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

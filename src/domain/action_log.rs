// ==========================================
// 救灾物资调配系统 - 分配操作日志领域模型
// ==========================================
// 红线: 所有分配写入必须记录
// 用途: 审计追踪
// 对齐: allocation_log 表
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,
    pub action_type: String,       // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,
    pub actor: String,
    pub disaster_id: Option<String>,     // 关联灾情 (库存维护类操作为 None)
    pub payload_json: Option<JsonValue>, // 请求参数
    pub result_json: Option<JsonValue>,  // 分配方案/结果摘要
    pub detail: Option<String>,
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    Allocate,   // 分配物资
    Resolve,    // 灾情需求全部满足并移除
    AddLot,     // 新增库存批次
    UpdateLot,  // 修改库存批次
    DeleteLot,  // 删除库存批次
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Allocate => "ALLOCATE",
            ActionType::Resolve => "RESOLVE",
            ActionType::AddLot => "ADD_LOT",
            ActionType::UpdateLot => "UPDATE_LOT",
            ActionType::DeleteLot => "DELETE_LOT",
        }
    }
}

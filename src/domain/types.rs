// ==========================================
// 救灾物资调配系统 - 领域类型定义
// ==========================================
// 职责: 物资类别、分配状态、灾情严重等级
// 红线: 库存侧类别名 medical 必须统一映射为 medicine
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 物资类别 (Supply Category)
// ==========================================
// 顺序: Food < Water < Medicine < Shelter (计划输出按此顺序排列)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupplyCategory {
    Food,     // 食品
    Water,    // 饮用水
    Medicine, // 药品 (库存侧存储为 medical)
    Shelter,  // 帐篷/庇护
}

impl SupplyCategory {
    /// 全部类别（固定顺序）
    pub const ALL: [SupplyCategory; 4] = [
        SupplyCategory::Food,
        SupplyCategory::Water,
        SupplyCategory::Medicine,
        SupplyCategory::Shelter,
    ];

    /// 请求侧名称
    pub fn as_str(&self) -> &'static str {
        match self {
            SupplyCategory::Food => "food",
            SupplyCategory::Water => "water",
            SupplyCategory::Medicine => "medicine",
            SupplyCategory::Shelter => "shelter",
        }
    }

    /// 库存侧存储名称
    pub fn inventory_name(&self) -> &'static str {
        match self {
            SupplyCategory::Medicine => "medical",
            other => other.as_str(),
        }
    }

    /// 解析库存侧类别名
    ///
    /// 大小写不敏感；`medical` 与 `medicine` 均映射为 Medicine。
    /// 未知类别返回 None（分配时忽略该批次）。
    pub fn from_inventory_name(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "food" => Some(SupplyCategory::Food),
            "water" => Some(SupplyCategory::Water),
            "medical" | "medicine" => Some(SupplyCategory::Medicine),
            "shelter" => Some(SupplyCategory::Shelter),
            _ => None,
        }
    }
}

impl fmt::Display for SupplyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 分配状态 (Allocation Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationStatus {
    Fulfilled,   // 全部满足
    Partial,     // 部分满足
    Unfulfilled, // 未分配
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationStatus::Fulfilled => write!(f, "FULFILLED"),
            AllocationStatus::Partial => write!(f, "PARTIAL"),
            AllocationStatus::Unfulfilled => write!(f, "UNFULFILLED"),
        }
    }
}

// ==========================================
// 灾情严重等级 (Severity Level)
// ==========================================
// 阈值: score >= 80 为 High, >= 50 为 Medium, 其余为 Low
// 顺序: Low < Medium < High
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeverityLevel {
    Low,
    Medium,
    High,
}

impl SeverityLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            SeverityLevel::High
        } else if score >= 50.0 {
            SeverityLevel::Medium
        } else {
            SeverityLevel::Low
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeverityLevel::Low => write!(f, "LOW"),
            SeverityLevel::Medium => write!(f, "MEDIUM"),
            SeverityLevel::High => write!(f, "HIGH"),
        }
    }
}

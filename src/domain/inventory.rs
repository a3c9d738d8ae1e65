// ==========================================
// 救灾物资调配系统 - 库存批次领域模型
// ==========================================
// 职责: 库存批次 (lot) 及其存储记录
// 红线: 引擎只读批次快照,只提出扣减方案,不直接修改批次
// ==========================================

use crate::domain::types::SupplyCategory;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// InventoryLot - 分配视角的库存批次
// ==========================================
// 用途: 引擎输入快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryLot {
    pub id: String,                              // 批次ID (不透明)
    pub category: String,                        // 库存侧原始类别名 (如 medical)
    pub quantity: f64,                           // 当前数量 (>= 0)
    pub expiration_date: Option<DateTime<Utc>>,  // 过期时间 (None = 永不过期,排在最后)
    pub revision: i32,                           // 乐观锁版本号
}

impl InventoryLot {
    /// 解析后的物资类别（未知类别返回 None）
    pub fn resolved_category(&self) -> Option<SupplyCategory> {
        SupplyCategory::from_inventory_name(&self.category)
    }
}

// ==========================================
// SupplyLot - 库存批次存储记录
// ==========================================
// 对齐: supply_lot 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyLot {
    // ===== 主键 =====
    pub lot_id: String,

    // ===== 基本信息 =====
    pub name: String,     // 物资名称 (如 Bottled Water)
    pub category: String, // 库存侧类别名
    pub unit: String,     // 计量单位 (bottles / kits / tents)
    pub location: String, // 存放地点

    // ===== 数量与时效 =====
    pub quantity: f64,
    pub expiration_date: Option<DateTime<Utc>>,

    // ===== 审计 =====
    pub last_updated: DateTime<Utc>,
    pub revision: i32,
}

impl SupplyLot {
    /// 转为引擎快照视图
    pub fn to_inventory_lot(&self) -> InventoryLot {
        InventoryLot {
            id: self.lot_id.clone(),
            category: self.category.clone(),
            quantity: self.quantity,
            expiration_date: self.expiration_date,
            revision: self.revision,
        }
    }

    /// 是否已在指定日期前过期
    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        self.expiration_date
            .map(|ts| ts.date_naive() < today)
            .unwrap_or(false)
    }
}

/// 新增批次输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSupplyLot {
    pub name: String,
    pub category: String,
    pub quantity: f64,
    pub unit: String,
    pub location: String,
    pub expiration_date: Option<DateTime<Utc>>,
}

/// 批次部分更新输入（None 表示不修改）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupplyLotUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub location: Option<String>,
    pub expiration_date: Option<Option<DateTime<Utc>>>,
}

// ==========================================
// CategorySummary - 分类别库存汇总
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: SupplyCategory,
    pub lot_count: usize,
    pub total_quantity: f64,
    pub expiring_soon_quantity: f64, // 在预警窗口内过期的数量
    pub expired_quantity: f64,       // 已过期但仍在库的数量
}

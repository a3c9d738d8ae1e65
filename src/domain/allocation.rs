// ==========================================
// 救灾物资调配系统 - 分配方案领域模型
// ==========================================
// 职责: 分配请求、逐批次扣减、分类别汇总
// ==========================================

use crate::domain::types::{AllocationStatus, SupplyCategory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// AllocationRequest - 分配请求 / 剩余需求
// ==========================================
// 字段名对齐外部契约: {food, water, medicine, shelter}
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationRequest {
    #[serde(default)]
    pub food: f64,
    #[serde(default)]
    pub water: f64,
    #[serde(default)]
    pub medicine: f64,
    #[serde(default)]
    pub shelter: f64,
}

impl AllocationRequest {
    pub fn new(food: f64, water: f64, medicine: f64, shelter: f64) -> Self {
        Self {
            food,
            water,
            medicine,
            shelter,
        }
    }

    /// 只请求单一类别
    pub fn single(category: SupplyCategory, quantity: f64) -> Self {
        let mut request = Self::default();
        request.set(category, quantity);
        request
    }

    pub fn get(&self, category: SupplyCategory) -> f64 {
        match category {
            SupplyCategory::Food => self.food,
            SupplyCategory::Water => self.water,
            SupplyCategory::Medicine => self.medicine,
            SupplyCategory::Shelter => self.shelter,
        }
    }

    pub fn set(&mut self, category: SupplyCategory, quantity: f64) {
        match category {
            SupplyCategory::Food => self.food = quantity,
            SupplyCategory::Water => self.water = quantity,
            SupplyCategory::Medicine => self.medicine = quantity,
            SupplyCategory::Shelter => self.shelter = quantity,
        }
    }

    /// 按固定类别顺序迭代 (类别, 数量)
    pub fn iter(&self) -> impl Iterator<Item = (SupplyCategory, f64)> + '_ {
        SupplyCategory::ALL.into_iter().map(move |c| (c, self.get(c)))
    }

    /// 四个类别是否全部为零
    pub fn is_zero(&self) -> bool {
        self.iter().all(|(_, qty)| qty == 0.0)
    }
}

// ==========================================
// LotDeduction - 单批次扣减
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotDeduction {
    pub lot_id: String,
    pub quantity: f64,          // 扣减数量 (> 0)
    pub expected_revision: i32, // 快照时的批次版本号 (写入时做乐观锁校验)
}

// ==========================================
// CategoryAllocation - 单类别分配结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAllocation {
    pub category: SupplyCategory,
    pub deductions: Vec<LotDeduction>, // 按消耗顺序排列
    pub required: f64,
    pub allocated: f64,  // = Σ deductions
    pub available: f64,  // 扣减前所有匹配批次数量之和
    pub status: AllocationStatus,
}

impl CategoryAllocation {
    /// 未满足的缺口
    pub fn shortfall(&self) -> f64 {
        (self.required - self.allocated).max(0.0)
    }
}

// ==========================================
// AllocationPlan - 分配方案 (引擎输出)
// ==========================================
// 仅包含 required > 0 的类别
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub categories: BTreeMap<SupplyCategory, CategoryAllocation>,
}

impl AllocationPlan {
    pub fn get(&self, category: SupplyCategory) -> Option<&CategoryAllocation> {
        self.categories.get(&category)
    }

    /// 某类别已分配数量（未出现在方案中视为 0）
    pub fn allocated(&self, category: SupplyCategory) -> f64 {
        self.get(category).map(|c| c.allocated).unwrap_or(0.0)
    }

    /// 全部批次扣减（按类别顺序展开）
    pub fn deductions(&self) -> impl Iterator<Item = &LotDeduction> {
        self.categories.values().flat_map(|c| c.deductions.iter())
    }

    /// 按类别汇总已分配数量
    pub fn allocated_totals(&self) -> AllocationRequest {
        let mut totals = AllocationRequest::default();
        for (category, allocation) in &self.categories {
            totals.set(*category, allocation.allocated);
        }
        totals
    }
}

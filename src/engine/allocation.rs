// ==========================================
// 救灾物资调配系统 - 物资分配引擎
// ==========================================
// 职责: 根据分配请求与库存快照计算逐批次扣减方案
// 输入: AllocationRequest + 库存批次快照
// 输出: AllocationPlan (不做任何写入)
// 红线: 先过期先出库 (无过期日期的批次最后消耗)
// 红线: 扣减总量不超过可用量,也不超过请求量
// ==========================================

use crate::domain::allocation::{
    AllocationPlan, AllocationRequest, CategoryAllocation, LotDeduction,
};
use crate::domain::disaster::DisasterNeed;
use crate::domain::inventory::InventoryLot;
use crate::domain::types::{AllocationStatus, SupplyCategory};
use crate::engine::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use tracing::{debug, instrument};

// ==========================================
// AllocationEngine - 物资分配引擎
// ==========================================
// 无状态引擎,可被任意数量的调用方并发使用
#[derive(Debug, Default, Clone, Copy)]
pub struct AllocationEngine {}

impl AllocationEngine {
    pub fn new() -> Self {
        Self {}
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 计算分配方案
    ///
    /// 规则（逐类别,仅处理 required > 0 的类别）：
    /// 1) 选出解析后类别匹配的批次（medical → medicine）
    /// 2) 按过期时间升序稳定排序,无过期时间的批次排在最后
    /// 3) 依次扣减 min(剩余需求, 批次数量),直至需求清零或批次耗尽
    /// 4) 汇总 available / allocated / status
    ///
    /// # 参数
    /// - `request`: 分配请求
    /// - `inventory`: 库存批次快照（顺序决定同过期时间批次的消耗次序）
    ///
    /// # 返回
    /// - Ok(AllocationPlan): 分配方案
    /// - Err(EngineError::InvalidRequest): 请求数量为负数/非有限值
    /// - Err(EngineError::InventoryInconsistency): 快照中存在负数量批次
    #[instrument(skip(self, request, inventory), fields(lots_count = inventory.len()))]
    pub fn plan(
        &self,
        request: &AllocationRequest,
        inventory: &[InventoryLot],
    ) -> EngineResult<AllocationPlan> {
        validate_request(request)?;
        validate_inventory(inventory)?;

        let mut plan = AllocationPlan::default();
        for (category, required) in request.iter() {
            if required == 0.0 {
                continue;
            }

            let allocation = allocate_category(category, required, inventory);
            debug!(
                category = %category,
                required = allocation.required,
                allocated = allocation.allocated,
                available = allocation.available,
                lots_touched = allocation.deductions.len(),
                status = %allocation.status,
                "类别分配完成"
            );
            plan.categories.insert(category, allocation);
        }

        Ok(plan)
    }

    /// 将分配方案应用到灾情需求
    ///
    /// 规则：
    /// - 方案中每个类别: remaining = max(0, remaining - allocated)
    /// - 类别已满足且 required >= remaining 时 remaining = 0
    /// - 四个类别全部为 0 时 fully_served = true（需求本已为 0 时直接满足）
    ///
    /// # 返回
    /// (更新后的需求, 是否已全部满足)
    #[instrument(skip(self, need, plan), fields(disaster_id = %need.key))]
    pub fn apply_to_need(&self, need: &DisasterNeed, plan: &AllocationPlan) -> (DisasterNeed, bool) {
        let mut updated = need.clone();

        for (category, allocation) in &plan.categories {
            let before = updated.remaining.get(*category);
            // 已满足且请求不小于剩余需求时直接清零,不受舍入影响
            let after = if allocation.status == AllocationStatus::Fulfilled
                && allocation.required >= before
            {
                0.0
            } else {
                (before - allocation.allocated).max(0.0)
            };
            updated.remaining.set(*category, after);
        }

        let fully_served = updated.remaining.is_zero();
        debug!(fully_served, remaining = ?updated.remaining, "需求已更新");
        (updated, fully_served)
    }
}

// ==========================================
// 内部实现
// ==========================================

fn validate_request(request: &AllocationRequest) -> EngineResult<()> {
    for (category, quantity) in request.iter() {
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(EngineError::InvalidRequest { category, quantity });
        }
    }
    Ok(())
}

fn validate_inventory(inventory: &[InventoryLot]) -> EngineResult<()> {
    match inventory
        .iter()
        .find(|lot| !lot.quantity.is_finite() || lot.quantity < 0.0)
    {
        Some(lot) => Err(EngineError::InventoryInconsistency {
            lot_id: lot.id.clone(),
            quantity: lot.quantity,
        }),
        None => Ok(()),
    }
}

/// 过期时间比较: 有日期的批次在前,无日期的批次在后
fn compare_expiration(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn allocate_category(
    category: SupplyCategory,
    required: f64,
    inventory: &[InventoryLot],
) -> CategoryAllocation {
    let mut lots: Vec<&InventoryLot> = inventory
        .iter()
        .filter(|lot| lot.resolved_category() == Some(category))
        .collect();
    // sort_by 为稳定排序,同过期时间保持快照顺序
    lots.sort_by(|a, b| compare_expiration(a.expiration_date, b.expiration_date));

    let available: f64 = lots.iter().map(|lot| lot.quantity).sum();

    // 按累计分配量推进,末批次的扣减量恰为剩余缺口
    let mut allocated = 0.0_f64;
    let mut covered = false;
    let mut deductions = Vec::new();
    for lot in lots {
        let outstanding = required - allocated;
        if outstanding <= 0.0 {
            covered = true;
            break;
        }
        if lot.quantity <= 0.0 {
            continue;
        }
        let deduction = if lot.quantity >= outstanding {
            outstanding
        } else {
            lot.quantity
        };
        deductions.push(LotDeduction {
            lot_id: lot.id.clone(),
            quantity: deduction,
            expected_revision: lot.revision,
        });
        if deduction == outstanding {
            covered = true;
            break;
        }
        allocated += deduction;
    }
    covered = covered || allocated >= required;

    // 浮点累加可能越过上界一个舍入步长,按 required / available 截断
    let allocated = (if covered { required } else { allocated.min(required) }).min(available);
    let status = if covered {
        AllocationStatus::Fulfilled
    } else if allocated > 0.0 {
        AllocationStatus::Partial
    } else {
        AllocationStatus::Unfulfilled
    };

    CategoryAllocation {
        category,
        deductions,
        required,
        allocated,
        available,
        status,
    }
}

// ==========================================
// 救灾物资调配系统 - 物资分配 API
// ==========================================
// 职责: 组合分配引擎与库存/报告仓储,完成一次完整分配
// 并发: 库存侧 revision 乐观锁 + 整体重试；报告侧读改写串行化
// 红线: 每次分配写入都记录操作日志
// ==========================================

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::allocation::{AllocationPlan, AllocationRequest};
use crate::domain::disaster::{DisasterNeed, DisasterReport, NeedLookup};
use crate::domain::types::AllocationStatus;
use crate::engine::{AllocationEngine, NeedPrioritySorter};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::error::RepositoryError;
use crate::repository::inventory_repo::InventoryStore;
use crate::repository::report_repo::DisasterReportStore;

// ==========================================
// 输出结构
// ==========================================

/// 一次分配的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationOutcome {
    pub disaster_id: String,
    pub plan: AllocationPlan,
    pub remaining: AllocationRequest, // 分配后的剩余需求
    pub fully_served: bool,           // true 时灾情已从报告中移除
    pub attempts: u32,                // 库存写入尝试次数
    pub message: String,
}

/// 分配预览（不写入）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationPreview {
    pub need: DisasterNeed,
    pub plan: AllocationPlan,
    pub remaining_after: AllocationRequest,
    pub would_resolve: bool,
}

// ==========================================
// AllocationApi - 物资分配 API
// ==========================================
pub struct AllocationApi {
    inventory: Arc<dyn InventoryStore>,
    report_store: Arc<dyn DisasterReportStore>,
    action_log_repo: Option<Arc<ActionLogRepository>>,
    engine: AllocationEngine,
    sorter: NeedPrioritySorter,
    max_attempts: u32,
    // 报告为整文件读改写,同一时刻只允许一个分配流程持有
    report_lock: AsyncMutex<()>,
}

impl AllocationApi {
    /// 创建新的AllocationApi实例
    ///
    /// # 参数
    /// - inventory: 库存仓储（快照读取 + 扣减写入）
    /// - report_store: 灾情报告仓储
    /// - action_log_repo: 操作日志仓储（None 时不记录）
    /// - max_attempts: 库存冲突时的最大尝试次数（至少 1）
    pub fn new(
        inventory: Arc<dyn InventoryStore>,
        report_store: Arc<dyn DisasterReportStore>,
        action_log_repo: Option<Arc<ActionLogRepository>>,
        max_attempts: u32,
    ) -> Self {
        Self {
            inventory,
            report_store,
            action_log_repo,
            engine: AllocationEngine::new(),
            sorter: NeedPrioritySorter::new(),
            max_attempts: max_attempts.max(1),
            report_lock: AsyncMutex::new(()),
        }
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 活跃灾情需求列表（按严重程度降序）
    pub async fn list_active_needs(&self) -> ApiResult<Vec<DisasterNeed>> {
        let report = self.report_store.load().await?;
        let mut needs = report.needs();
        self.sorter.sort(&mut needs);
        Ok(needs)
    }

    /// 分配预览（仅计算方案,不做任何写入）
    ///
    /// # 参数
    /// - request: None 时按灾情剩余需求全额预览
    pub async fn preview(
        &self,
        disaster_id: &str,
        request: Option<AllocationRequest>,
    ) -> ApiResult<AllocationPreview> {
        let report = self.report_store.load().await?;
        let need = find_need(&report, disaster_id)?;
        let request = request.unwrap_or(need.remaining);

        let snapshot = self.inventory.snapshot()?;
        let plan = self.engine.plan(&request, &snapshot)?;
        let (updated, would_resolve) = self.engine.apply_to_need(&need, &plan);

        Ok(AllocationPreview {
            need,
            plan,
            remaining_after: updated.remaining,
            would_resolve,
        })
    }

    // ==========================================
    // 分配接口
    // ==========================================

    /// 按指定数量分配物资
    ///
    /// # 流程
    /// 1. 读取报告,定位灾情（不存在 -> NotFound）
    /// 2. 读取库存快照 -> 计算方案 -> 原子扣减；快照过期则重新读取重试
    /// 3. 应用方案到需求,写回报告（满足则移除灾情）
    /// 4. 记录操作日志
    ///
    /// # 返回
    /// - Ok(AllocationOutcome)
    /// - Err(InvalidRequest / InventoryInconsistency): 输入或库存数据异常,未做任何写入
    /// - Err(NotFound): 灾情不存在
    /// - Err(ConcurrencyConflict): 多次重试后库存仍被并发修改
    pub async fn allocate(
        &self,
        disaster_id: &str,
        request: AllocationRequest,
        actor: &str,
    ) -> ApiResult<AllocationOutcome> {
        self.allocate_inner(disaster_id, Some(request), actor).await
    }

    /// 按灾情剩余需求全额分配
    pub async fn allocate_remaining(
        &self,
        disaster_id: &str,
        actor: &str,
    ) -> ApiResult<AllocationOutcome> {
        self.allocate_inner(disaster_id, None, actor).await
    }

    #[instrument(skip(self, request), fields(disaster_id = %disaster_id, actor = %actor))]
    async fn allocate_inner(
        &self,
        disaster_id: &str,
        request: Option<AllocationRequest>,
        actor: &str,
    ) -> ApiResult<AllocationOutcome> {
        let _report_guard = self.report_lock.lock().await;

        let mut report = self.report_store.load().await?;
        let need = find_need(&report, disaster_id)?;
        let request = request.unwrap_or(need.remaining);
        debug!(?request, remaining = ?need.remaining, "开始分配");

        let (plan, attempts) = self.plan_and_apply(&request)?;

        let (updated, fully_served) = self.engine.apply_to_need(&need, &plan);
        if !report.write_back(&updated, fully_served) {
            return Err(ApiError::InternalError(format!(
                "灾情{}在写回时丢失",
                disaster_id
            )));
        }
        if let Err(e) = self.report_store.save(&report).await {
            // 库存已扣减但报告未更新,需人工核对
            error!(error = %e, plan = ?plan, "库存已扣减，灾情报告写回失败");
            return Err(e.into());
        }

        let message = if fully_served {
            "物资已全部分配，灾情已从报告中移除".to_string()
        } else {
            "物资已部分分配".to_string()
        };
        info!(
            fully_served,
            attempts,
            allocated = ?plan.allocated_totals(),
            "分配完成"
        );

        let outcome = AllocationOutcome {
            disaster_id: disaster_id.to_string(),
            plan,
            remaining: updated.remaining,
            fully_served,
            attempts,
            message,
        };
        self.record_action(&request, &outcome, actor);
        Ok(outcome)
    }

    /// 读取快照 -> 计算方案 -> 原子扣减,快照过期时重试
    fn plan_and_apply(&self, request: &AllocationRequest) -> ApiResult<(AllocationPlan, u32)> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let snapshot = self.inventory.snapshot()?;
            let plan = self.engine.plan(request, &snapshot)?;

            match self.inventory.apply_deductions(&plan) {
                Ok(updated_lots) => {
                    debug!(attempt, updated_lots, "库存扣减已提交");
                    return Ok((plan, attempt));
                }
                Err(e) if is_stale_snapshot(&e) && attempt < self.max_attempts => {
                    warn!(attempt, error = %e, "库存快照已过期，重新读取后重试");
                }
                Err(e) if is_stale_snapshot(&e) => {
                    return Err(ApiError::ConcurrencyConflict {
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn record_action(&self, request: &AllocationRequest, outcome: &AllocationOutcome, actor: &str) {
        let Some(repo) = &self.action_log_repo else {
            return;
        };

        let action_type = if outcome.fully_served {
            ActionType::Resolve
        } else {
            ActionType::Allocate
        };
        let detail = outcome
            .plan
            .categories
            .values()
            .map(|c| format!("{}: {}/{} ({})", c.category, c.allocated, c.required, c.status))
            .collect::<Vec<_>>()
            .join("; ");

        let log = ActionLog {
            action_id: Uuid::new_v4().to_string(),
            action_type: action_type.as_str().to_string(),
            action_ts: Utc::now().naive_utc(),
            actor: actor.to_string(),
            disaster_id: Some(outcome.disaster_id.clone()),
            payload_json: serde_json::to_value(request).ok(),
            result_json: serde_json::to_value(&outcome.plan).ok(),
            detail: Some(detail),
        };

        // 分配已提交,日志失败只告警
        if let Err(e) = repo.insert(&log) {
            warn!(error = %e, "分配操作日志记录失败");
        }
    }
}

fn find_need(
    report: &DisasterReport,
    disaster_id: &str,
) -> ApiResult<DisasterNeed> {
    match report.find_need(disaster_id) {
        NeedLookup::Found(need) => Ok(need),
        NeedLookup::Missing => Err(ApiError::NotFound(format!("灾情{}不存在", disaster_id))),
        NeedLookup::Ambiguous(keys) => {
            let candidates = keys
                .iter()
                .map(|key| format!("{}/{}", key.country, key.disaster_type))
                .collect::<Vec<_>>()
                .join(", ");
            Err(ApiError::InvalidInput(format!(
                "灾情ID{}不唯一，对应: {}",
                disaster_id, candidates
            )))
        }
    }
}

/// 快照过期: revision 变化、数量不足或批次已被删除
fn is_stale_snapshot(err: &RepositoryError) -> bool {
    err.is_conflict() || matches!(err, RepositoryError::NotFound { .. })
}

/// 汇总方案中各状态的类别数（用于展示）
pub fn status_counts(plan: &AllocationPlan) -> (usize, usize, usize) {
    plan.categories
        .values()
        .fold((0, 0, 0), |(f, p, u), c| match c.status {
            AllocationStatus::Fulfilled => (f + 1, p, u),
            AllocationStatus::Partial => (f, p + 1, u),
            AllocationStatus::Unfulfilled => (f, p, u + 1),
        })
}

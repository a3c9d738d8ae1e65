// ==========================================
// 救灾物资调配系统 - 库存批次 API
// ==========================================
// 职责: 批次录入、修改、删除、查询与分类别汇总
// 红线: 写入前完成输入校验,所有写入记录操作日志
// ==========================================

use std::sync::Arc;

use chrono::{NaiveDate, TimeDelta, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::inventory::{CategorySummary, NewSupplyLot, SupplyLot, SupplyLotUpdate};
use crate::domain::types::SupplyCategory;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::inventory_repo::SupplyLotRepository;

/// 物资名称最短长度
const MIN_NAME_LEN: usize = 2;

// ==========================================
// SupplyApi - 库存批次 API
// ==========================================
pub struct SupplyApi {
    lot_repo: Arc<SupplyLotRepository>,
    action_log_repo: Option<Arc<ActionLogRepository>>,
    config: Arc<ConfigManager>,
}

impl SupplyApi {
    pub fn new(
        lot_repo: Arc<SupplyLotRepository>,
        action_log_repo: Option<Arc<ActionLogRepository>>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            lot_repo,
            action_log_repo,
            config,
        }
    }

    // ==========================================
    // 写入接口
    // ==========================================

    /// 录入新批次
    ///
    /// # 校验
    /// - 名称至少 2 个字符
    /// - 类别必须可识别（存储为库存侧名称,medicine 存为 medical）
    /// - 数量 > 0
    /// - 单位、地点不能为空
    #[instrument(skip(self, input), fields(name = %input.name, category = %input.category))]
    pub fn add_lot(&self, input: NewSupplyLot, actor: &str) -> ApiResult<SupplyLot> {
        let category = validate_category(&input.category)?;
        validate_name(&input.name)?;
        validate_quantity(input.quantity, false)?;
        validate_required("单位", &input.unit)?;
        validate_required("存放地点", &input.location)?;

        let lot = SupplyLot {
            lot_id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            category: category.inventory_name().to_string(),
            unit: input.unit.trim().to_string(),
            location: input.location.trim().to_string(),
            quantity: input.quantity,
            expiration_date: input.expiration_date,
            last_updated: Utc::now(),
            revision: 0,
        };
        self.lot_repo.insert(&lot)?;
        info!(lot_id = %lot.lot_id, quantity = lot.quantity, "批次已录入");

        self.record_action(ActionType::AddLot, &lot.lot_id, &lot, actor);
        Ok(lot)
    }

    /// 修改批次（部分字段）
    ///
    /// 数量允许改为 0（清空批次）,不允许为负。
    /// 读取与写入之间若批次被其他写入者修改,返回 OptimisticLockFailure。
    #[instrument(skip(self, update))]
    pub fn update_lot(
        &self,
        lot_id: &str,
        update: SupplyLotUpdate,
        actor: &str,
    ) -> ApiResult<SupplyLot> {
        let mut lot = self.get_lot(lot_id)?;

        if let Some(name) = update.name {
            validate_name(&name)?;
            lot.name = name.trim().to_string();
        }
        if let Some(category) = update.category {
            lot.category = validate_category(&category)?.inventory_name().to_string();
        }
        if let Some(quantity) = update.quantity {
            validate_quantity(quantity, true)?;
            lot.quantity = quantity;
        }
        if let Some(unit) = update.unit {
            validate_required("单位", &unit)?;
            lot.unit = unit.trim().to_string();
        }
        if let Some(location) = update.location {
            validate_required("存放地点", &location)?;
            lot.location = location.trim().to_string();
        }
        if let Some(expiration_date) = update.expiration_date {
            lot.expiration_date = expiration_date;
        }
        lot.last_updated = Utc::now();

        lot.revision = self.lot_repo.update(&lot)?;
        info!(lot_id, revision = lot.revision, "批次已更新");

        self.record_action(ActionType::UpdateLot, lot_id, &lot, actor);
        Ok(lot)
    }

    /// 删除批次
    pub fn delete_lot(&self, lot_id: &str, actor: &str) -> ApiResult<()> {
        let lot = self.get_lot(lot_id)?;
        if !self.lot_repo.delete(lot_id)? {
            return Err(ApiError::NotFound(format!("批次{}不存在", lot_id)));
        }
        info!(lot_id, "批次已删除");

        self.record_action(ActionType::DeleteLot, lot_id, &lot, actor);
        Ok(())
    }

    // ==========================================
    // 查询接口
    // ==========================================

    pub fn get_lot(&self, lot_id: &str) -> ApiResult<SupplyLot> {
        self.lot_repo
            .find_by_id(lot_id)?
            .ok_or_else(|| ApiError::NotFound(format!("批次{}不存在", lot_id)))
    }

    /// 批次列表（可按类别过滤）
    pub fn list_lots(&self, category: Option<SupplyCategory>) -> ApiResult<Vec<SupplyLot>> {
        Ok(self.lot_repo.list(category)?)
    }

    /// 分类别库存汇总
    ///
    /// # 参数
    /// - today: 统计基准日（已过期 = 过期日早于 today;临期 = 过期日在预警窗口内）
    ///
    /// # 返回
    /// 四个类别各一条,顺序固定；未知类别的批次不计入
    pub fn inventory_summary(&self, today: NaiveDate) -> ApiResult<Vec<CategorySummary>> {
        let window_days = self.config.get_expiring_soon_days()?;
        // 窗口超出日期范围时视为无上限
        let horizon = TimeDelta::try_days(window_days)
            .and_then(|window| today.checked_add_signed(window))
            .unwrap_or(NaiveDate::MAX);
        let lots = self.lot_repo.list(None)?;

        let summaries = SupplyCategory::ALL
            .iter()
            .map(|&category| {
                let mut summary = CategorySummary {
                    category,
                    lot_count: 0,
                    total_quantity: 0.0,
                    expiring_soon_quantity: 0.0,
                    expired_quantity: 0.0,
                };
                for lot in lots
                    .iter()
                    .filter(|lot| SupplyCategory::from_inventory_name(&lot.category) == Some(category))
                {
                    summary.lot_count += 1;
                    summary.total_quantity += lot.quantity;
                    if lot.is_expired_on(today) {
                        summary.expired_quantity += lot.quantity;
                    } else if let Some(expiration) = lot.expiration_date {
                        if expiration.date_naive() <= horizon {
                            summary.expiring_soon_quantity += lot.quantity;
                        }
                    }
                }
                summary
            })
            .collect();
        Ok(summaries)
    }

    fn record_action(&self, action_type: ActionType, lot_id: &str, lot: &SupplyLot, actor: &str) {
        let Some(repo) = &self.action_log_repo else {
            return;
        };
        let log = ActionLog {
            action_id: Uuid::new_v4().to_string(),
            action_type: action_type.as_str().to_string(),
            action_ts: Utc::now().naive_utc(),
            actor: actor.to_string(),
            disaster_id: None,
            payload_json: serde_json::to_value(lot).ok(),
            result_json: None,
            detail: Some(format!("lot_id={}", lot_id)),
        };
        if let Err(e) = repo.insert(&log) {
            warn!(error = %e, lot_id, "批次操作日志记录失败");
        }
    }
}

// ==========================================
// 输入校验
// ==========================================

fn validate_name(name: &str) -> ApiResult<()> {
    if name.trim().chars().count() < MIN_NAME_LEN {
        return Err(ApiError::InvalidInput(format!(
            "物资名称至少需要{}个字符",
            MIN_NAME_LEN
        )));
    }
    Ok(())
}

fn validate_category(raw: &str) -> ApiResult<SupplyCategory> {
    SupplyCategory::from_inventory_name(raw)
        .ok_or_else(|| ApiError::InvalidInput(format!("未知的物资类别: {}", raw)))
}

fn validate_quantity(quantity: f64, allow_zero: bool) -> ApiResult<()> {
    let valid = quantity.is_finite() && (quantity > 0.0 || (allow_zero && quantity == 0.0));
    if !valid {
        return Err(ApiError::InvalidInput(format!("数量无效: {}", quantity)));
    }
    Ok(())
}

fn validate_required(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("{}不能为空", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1.5, false).is_ok());
        assert!(validate_quantity(0.0, false).is_err());
        assert!(validate_quantity(0.0, true).is_ok());
        assert!(validate_quantity(-1.0, true).is_err());
        assert!(validate_quantity(f64::NAN, true).is_err());
    }

    #[test]
    fn test_validate_name_and_category() {
        assert!(validate_name("W").is_err());
        assert!(validate_name(" 水 ").is_err());
        assert!(validate_name("Rice").is_ok());
        assert_eq!(validate_category("Medicine").unwrap(), SupplyCategory::Medicine);
        assert!(validate_category("fuel").is_err());
    }
}

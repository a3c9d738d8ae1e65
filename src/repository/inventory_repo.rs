// ==========================================
// 救灾物资调配系统 - 库存批次数据仓储
// ==========================================
// 红线: Repository 不含分配逻辑,只做数据映射
// 红线: 同一批次同一时刻最多一个写入者 (revision 乐观锁)
// ==========================================
// 实现:
// - SupplyLotRepository: SQLite 持久化 (生产)
// - InMemoryInventory: 内存实现 (测试/演练)
// ==========================================

use crate::domain::allocation::AllocationPlan;
use crate::domain::inventory::{InventoryLot, SupplyLot};
use crate::domain::types::SupplyCategory;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// Trait: 库存快照读取 / 扣减写入
// ==========================================

/// 库存快照读取接口
pub trait InventorySnapshotReader: Send + Sync {
    /// 读取全部批次的时点快照（顺序稳定）
    fn snapshot(&self) -> RepositoryResult<Vec<InventoryLot>>;
}

/// 库存扣减写入接口
pub trait InventoryWriter: Send + Sync {
    /// 原子地应用分配方案中的全部扣减
    ///
    /// # 规则
    /// - 每个批次的 revision 必须与快照一致,且数量足够
    /// - 任一批次校验失败则整体回滚
    ///
    /// # 返回
    /// - Ok(usize): 被更新的批次数
    /// - Err(OptimisticLockFailure / InsufficientQuantity): 快照已过期,调用方应重新读取快照重试
    /// - Err(NotFound): 批次已被删除
    fn apply_deductions(&self, plan: &AllocationPlan) -> RepositoryResult<usize>;
}

/// 读写合一的库存仓储（分配服务注入用）
pub trait InventoryStore: InventorySnapshotReader + InventoryWriter {}

impl<T: InventorySnapshotReader + InventoryWriter> InventoryStore for T {}

// ==========================================
// InMemoryInventory - 内存库存
// ==========================================
#[derive(Debug, Default)]
pub struct InMemoryInventory {
    lots: Mutex<Vec<InventoryLot>>,
}

impl InMemoryInventory {
    pub fn new(lots: Vec<InventoryLot>) -> Self {
        Self {
            lots: Mutex::new(lots),
        }
    }

    fn guard(&self) -> RepositoryResult<MutexGuard<'_, Vec<InventoryLot>>> {
        self.lots
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 追加批次
    pub fn push(&self, lot: InventoryLot) -> RepositoryResult<()> {
        self.guard()?.push(lot);
        Ok(())
    }

    /// 按ID读取单个批次
    pub fn get(&self, lot_id: &str) -> RepositoryResult<Option<InventoryLot>> {
        Ok(self.guard()?.iter().find(|lot| lot.id == lot_id).cloned())
    }

    /// 直接设置批次数量（模拟外部写入者,revision + 1）
    pub fn set_quantity(&self, lot_id: &str, quantity: f64) -> RepositoryResult<()> {
        let mut lots = self.guard()?;
        let lot = lots
            .iter_mut()
            .find(|lot| lot.id == lot_id)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "InventoryLot".to_string(),
                id: lot_id.to_string(),
            })?;
        lot.quantity = quantity;
        lot.revision += 1;
        Ok(())
    }
}

impl InventorySnapshotReader for InMemoryInventory {
    fn snapshot(&self) -> RepositoryResult<Vec<InventoryLot>> {
        Ok(self.guard()?.clone())
    }
}

impl InventoryWriter for InMemoryInventory {
    fn apply_deductions(&self, plan: &AllocationPlan) -> RepositoryResult<usize> {
        let mut lots = self.guard()?;

        // 先整体校验,再整体写入
        let mut staged: Vec<(usize, f64)> = Vec::new();
        for deduction in plan.deductions() {
            let index = lots
                .iter()
                .position(|lot| lot.id == deduction.lot_id)
                .ok_or_else(|| RepositoryError::NotFound {
                    entity: "InventoryLot".to_string(),
                    id: deduction.lot_id.clone(),
                })?;
            let lot = &lots[index];
            if lot.revision != deduction.expected_revision {
                return Err(RepositoryError::OptimisticLockFailure {
                    entity_id: lot.id.clone(),
                    expected: deduction.expected_revision,
                    actual: lot.revision,
                });
            }
            if lot.quantity < deduction.quantity {
                return Err(RepositoryError::InsufficientQuantity {
                    lot_id: lot.id.clone(),
                    requested: deduction.quantity,
                });
            }
            staged.push((index, deduction.quantity));
        }

        for (index, quantity) in &staged {
            let lot = &mut lots[*index];
            lot.quantity -= quantity;
            lot.revision += 1;
        }
        Ok(staged.len())
    }
}

// ==========================================
// SupplyLotRepository - SQLite 库存仓储
// ==========================================
// 职责: 管理 supply_lot 表的 CRUD + 分配扣减
pub struct SupplyLotRepository {
    conn: Arc<Mutex<Connection>>,
}

const SELECT_COLUMNS: &str = r#"
    SELECT lot_id, name, category, quantity, unit, location,
           expiration_date, last_updated, revision
    FROM supply_lot
"#;

impl SupplyLotRepository {
    /// 从已有连接创建仓储实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入批次
    pub fn insert(&self, lot: &SupplyLot) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO supply_lot (
                lot_id, name, category, quantity, unit, location,
                expiration_date, last_updated, revision
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                lot.lot_id,
                lot.name,
                lot.category,
                lot.quantity,
                lot.unit,
                lot.location,
                lot.expiration_date,
                lot.last_updated,
                lot.revision,
            ],
        )?;
        Ok(())
    }

    /// 更新批次（带 revision 乐观锁）
    ///
    /// # 返回
    /// - Ok(new_revision)
    /// - Err(OptimisticLockFailure): revision 不匹配（其他写入者已更新）
    /// - Err(NotFound): 批次不存在
    pub fn update(&self, lot: &SupplyLot) -> RepositoryResult<i32> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE supply_lot
            SET name = ?1, category = ?2, quantity = ?3, unit = ?4, location = ?5,
                expiration_date = ?6, last_updated = ?7, revision = revision + 1
            WHERE lot_id = ?8 AND revision = ?9
            "#,
            params![
                lot.name,
                lot.category,
                lot.quantity,
                lot.unit,
                lot.location,
                lot.expiration_date,
                lot.last_updated,
                lot.lot_id,
                lot.revision,
            ],
        )?;

        if affected == 0 {
            return Err(conflict_or_missing(&conn, &lot.lot_id, lot.revision)?);
        }
        Ok(lot.revision + 1)
    }

    /// 删除批次
    ///
    /// # 返回
    /// - Ok(true): 已删除
    /// - Ok(false): 批次不存在
    pub fn delete(&self, lot_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM supply_lot WHERE lot_id = ?1", params![lot_id])?;
        Ok(affected > 0)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, lot_id: &str) -> RepositoryResult<Option<SupplyLot>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE lot_id = ?1", SELECT_COLUMNS);
        let lot = conn
            .query_row(&sql, params![lot_id], map_supply_lot)
            .optional()?;
        Ok(lot)
    }

    /// 查询批次列表（按录入顺序）
    ///
    /// # 参数
    /// - category: 可选类别过滤（按解析后类别匹配,medical 归入 medicine）
    pub fn list(&self, category: Option<SupplyCategory>) -> RepositoryResult<Vec<SupplyLot>> {
        let conn = self.get_conn()?;
        let sql = format!("{} ORDER BY rowid", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let lots = stmt
            .query_map([], map_supply_lot)?
            .collect::<SqliteResult<Vec<SupplyLot>>>()?;

        Ok(match category {
            Some(category) => lots
                .into_iter()
                .filter(|lot| SupplyCategory::from_inventory_name(&lot.category) == Some(category))
                .collect(),
            None => lots,
        })
    }
}

impl InventorySnapshotReader for SupplyLotRepository {
    fn snapshot(&self) -> RepositoryResult<Vec<InventoryLot>> {
        Ok(self
            .list(None)?
            .iter()
            .map(SupplyLot::to_inventory_lot)
            .collect())
    }
}

impl InventoryWriter for SupplyLotRepository {
    fn apply_deductions(&self, plan: &AllocationPlan) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now();

        let mut updated = 0;
        for deduction in plan.deductions() {
            let affected = tx.execute(
                r#"
                UPDATE supply_lot
                SET quantity = quantity - ?1, last_updated = ?2, revision = revision + 1
                WHERE lot_id = ?3 AND revision = ?4 AND quantity >= ?1
                "#,
                params![
                    deduction.quantity,
                    now,
                    deduction.lot_id,
                    deduction.expected_revision,
                ],
            )?;

            if affected == 0 {
                // tx 未提交即被丢弃,此前的扣减整体回滚
                let current: Option<(i32, f64)> = tx
                    .query_row(
                        "SELECT revision, quantity FROM supply_lot WHERE lot_id = ?1",
                        params![deduction.lot_id],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;
                return Err(match current {
                    None => RepositoryError::NotFound {
                        entity: "supply_lot".to_string(),
                        id: deduction.lot_id.clone(),
                    },
                    Some((revision, _)) if revision != deduction.expected_revision => {
                        RepositoryError::OptimisticLockFailure {
                            entity_id: deduction.lot_id.clone(),
                            expected: deduction.expected_revision,
                            actual: revision,
                        }
                    }
                    Some(_) => RepositoryError::InsufficientQuantity {
                        lot_id: deduction.lot_id.clone(),
                        requested: deduction.quantity,
                    },
                });
            }
            updated += affected;
        }

        tx.commit()?;
        Ok(updated)
    }
}

// ==========================================
// 行映射
// ==========================================

fn map_supply_lot(row: &Row<'_>) -> SqliteResult<SupplyLot> {
    Ok(SupplyLot {
        lot_id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        quantity: row.get(3)?,
        unit: row.get(4)?,
        location: row.get(5)?,
        expiration_date: row.get::<_, Option<DateTime<Utc>>>(6)?,
        last_updated: row.get(7)?,
        revision: row.get(8)?,
    })
}

fn conflict_or_missing(
    conn: &Connection,
    lot_id: &str,
    expected: i32,
) -> RepositoryResult<RepositoryError> {
    let actual: Option<i32> = conn
        .query_row(
            "SELECT revision FROM supply_lot WHERE lot_id = ?1",
            params![lot_id],
            |row| row.get(0),
        )
        .optional()?;

    Ok(match actual {
        Some(actual) => RepositoryError::OptimisticLockFailure {
            entity_id: lot_id.to_string(),
            expected,
            actual,
        },
        None => RepositoryError::NotFound {
            entity: "supply_lot".to_string(),
            id: lot_id.to_string(),
        },
    })
}

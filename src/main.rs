// ==========================================
// 救灾物资调配系统 - 命令行入口
// ==========================================
// 用法:
//   relief-allocation needs              列出活跃灾情（按严重程度）
//   relief-allocation summary            分类别库存汇总
//   relief-allocation lots [category]    列出库存批次
//   relief-allocation add-lot <name> <category> <quantity> <unit> <location> [YYYY-MM-DD]
//                                        录入库存批次
//   relief-allocation preview <id>       预览按剩余需求的分配方案
//   relief-allocation allocate <id>      按剩余需求执行分配
//
// 数据库路径: RELIEF_ALLOCATION_DB_PATH 或用户数据目录
// ==========================================

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use relief_allocation::api::allocation_api::status_counts;
use relief_allocation::app::{get_default_db_path, AppState};
use relief_allocation::domain::{AllocationPlan, NewSupplyLot};
use relief_allocation::logging;
use relief_allocation::SupplyCategory;

const USAGE: &str = "用法: relief-allocation <needs|summary|lots [category]|add-lot <name> <category> <quantity> <unit> <location> [YYYY-MM-DD]|preview <id>|allocate <id>>";

/// 命令行子命令
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Needs,
    Summary,
    Lots(Option<SupplyCategory>),
    AddLot(NewSupplyLot),
    Preview(String),
    Allocate(String),
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_command(&args)?;

    let db_path = get_default_db_path();
    tracing::info!("{} v{}，数据库: {}", relief_allocation::APP_NAME, relief_allocation::VERSION, db_path);
    let state = AppState::new(db_path).map_err(anyhow::Error::msg)?;

    let result = run(&state, command).await;
    state.shutdown().context("关闭存储失败")?;
    result
}

/// 解析参数（不含程序名）；无参数时默认 needs
fn parse_command(args: &[String]) -> Result<Command> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let command = match args.as_slice() {
        [] | ["needs"] => Command::Needs,
        ["summary"] => Command::Summary,
        ["lots"] => Command::Lots(None),
        ["lots", category] => match SupplyCategory::from_inventory_name(category) {
            Some(category) => Command::Lots(Some(category)),
            None => bail!("未知的物资类别: {}", category),
        },
        ["add-lot", name, category, quantity, unit, location, rest @ ..] if rest.len() <= 1 => {
            let quantity: f64 = quantity
                .parse()
                .with_context(|| format!("数量无效: {}", quantity))?;
            let expiration_date = rest.first().map(|raw| parse_expiration(raw)).transpose()?;
            Command::AddLot(NewSupplyLot {
                name: name.to_string(),
                category: category.to_string(),
                quantity,
                unit: unit.to_string(),
                location: location.to_string(),
                expiration_date,
            })
        }
        ["preview", id] => Command::Preview(id.to_string()),
        ["allocate", id] => Command::Allocate(id.to_string()),
        _ => bail!(USAGE),
    };
    Ok(command)
}

/// 过期日按 UTC 零点存储
fn parse_expiration(raw: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("过期日期格式应为 YYYY-MM-DD: {}", raw))?;
    Ok(Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN)))
}

async fn run(state: &AppState, command: Command) -> Result<()> {
    match command {
        Command::Needs => {
            let needs = state.allocation_api.list_active_needs().await?;
            if needs.is_empty() {
                println!("当前没有待分配的灾情");
            }
            for need in needs {
                println!(
                    "{:<32} {:<6} severity={:<6.1} food={} water={} medicine={} shelter={}  {}",
                    need.id(),
                    need.severity_level().to_string(),
                    need.severity,
                    need.remaining.food,
                    need.remaining.water,
                    need.remaining.medicine,
                    need.remaining.shelter,
                    need.title,
                );
            }
        }
        Command::Summary => {
            let today = Utc::now().date_naive();
            for summary in state.supply_api.inventory_summary(today)? {
                println!(
                    "{:<9} lots={:<4} total={:<10} expiring_soon={:<10} expired={}",
                    summary.category.to_string(),
                    summary.lot_count,
                    summary.total_quantity,
                    summary.expiring_soon_quantity,
                    summary.expired_quantity,
                );
            }
        }
        Command::Lots(category) => {
            let lots = state.supply_api.list_lots(category)?;
            if lots.is_empty() {
                println!("没有库存批次");
            }
            for lot in lots {
                let expiration = lot
                    .expiration_date
                    .map(|d| d.date_naive().to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<36} {:<9} {:<24} qty={:<10} {:<10} expires={:<10} @ {}",
                    lot.lot_id, lot.category, lot.name, lot.quantity, lot.unit, expiration, lot.location,
                );
            }
        }
        Command::AddLot(input) => {
            let lot = state.supply_api.add_lot(input, "cli")?;
            println!("已录入批次 {}（{} {} {}）", lot.lot_id, lot.category, lot.quantity, lot.unit);
        }
        Command::Preview(id) => {
            let preview = state.allocation_api.preview(&id, None).await?;
            print_plan(&preview.plan);
            println!(
                "分配后剩余: {}",
                serde_json::to_string(&preview.remaining_after)?
            );
            println!("可完全满足: {}", preview.would_resolve);
        }
        Command::Allocate(id) => {
            let outcome = state.allocation_api.allocate_remaining(&id, "cli").await?;
            print_plan(&outcome.plan);
            println!("{}（尝试{}次）", outcome.message, outcome.attempts);
        }
    }
    Ok(())
}

fn print_plan(plan: &AllocationPlan) {
    for allocation in plan.categories.values() {
        println!(
            "{:<9} {:<12} allocated={} required={} available={} lots={}",
            allocation.category.to_string(),
            allocation.status.to_string(),
            allocation.allocated,
            allocation.required,
            allocation.available,
            allocation.deductions.len(),
        );
    }
    let (fulfilled, partial, unfulfilled) = status_counts(plan);
    println!(
        "满足 {} 类 / 部分 {} 类 / 未分配 {} 类",
        fulfilled, partial, unfulfilled
    );
}

// ==========================================
// 救灾物资调配系统 - 灾情需求领域模型
// ==========================================
// 职责: 灾情报告嵌套结构 + 扁平化需求视图
// 对齐: disaster_allocations_report.json
//   {countries: {<name>: {total_disasters, disasters: {<type>: {title, severity, supplies}}}},
//    total_disasters}
// 红线: 需求满足后从报告中移除,并同步递减计数器
// ==========================================

use crate::domain::allocation::AllocationRequest;
use crate::domain::types::SeverityLevel;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

// ==========================================
// DisasterKey - 灾情复合键 (国家/地区 + 灾害类型)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DisasterKey {
    pub country: String,
    pub disaster_type: String,
}

impl DisasterKey {
    pub fn new(country: impl Into<String>, disaster_type: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            disaster_type: disaster_type.into(),
        }
    }

    /// 外部ID: "<country>-<type>"
    pub fn id(&self) -> String {
        format!("{}-{}", self.country, self.disaster_type)
    }
}

impl fmt::Display for DisasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.country, self.disaster_type)
    }
}

// ==========================================
// NeedLookup - 按外部ID查找的结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum NeedLookup {
    Found(DisasterNeed),
    Missing,
    /// 多个 (国家, 类型) 拼出同一ID
    Ambiguous(Vec<DisasterKey>),
}

// ==========================================
// DisasterNeed - 单个灾情的剩余需求
// ==========================================
// 生命周期: Active -> [应用分配方案] -> Active(需求减少) | Resolved(终态,从报告移除)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisasterNeed {
    pub key: DisasterKey,
    pub title: String,
    pub severity: f64,
    pub remaining: AllocationRequest,
}

impl DisasterNeed {
    pub fn id(&self) -> String {
        self.key.id()
    }

    pub fn severity_level(&self) -> SeverityLevel {
        SeverityLevel::from_score(self.severity)
    }
}

// ==========================================
// 报告文件结构
// ==========================================
// extra: 保留未知字段 (如坐标、时间戳),避免写回时丢失

/// 单条灾情记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisasterEntry {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub severity: f64,
    #[serde(default)]
    pub supplies: AllocationRequest,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 单个国家/地区下的灾情集合
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountryReport {
    #[serde(default)]
    pub total_disasters: u32,
    #[serde(default)]
    pub disasters: BTreeMap<String, DisasterEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 灾情报告根结构
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisasterReport {
    #[serde(default)]
    pub countries: BTreeMap<String, CountryReport>,
    #[serde(default)]
    pub total_disasters: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DisasterReport {
    /// 扁平化为需求列表（按国家、灾害类型排序）
    pub fn needs(&self) -> Vec<DisasterNeed> {
        self.countries
            .iter()
            .flat_map(|(country, report)| {
                report
                    .disasters
                    .iter()
                    .map(move |(disaster_type, entry)| to_need(country, disaster_type, entry))
            })
            .collect()
    }

    /// 按外部ID查找需求
    ///
    /// 逐条拼接 "<country>-<type>" 比较,国家名中含 '-' 时同样适用。
    /// ("A-B", "c") 与 ("A", "B-c") 拼出同一ID,此时返回 Ambiguous 而不是任选其一。
    pub fn find_need(&self, disaster_id: &str) -> NeedLookup {
        let mut matches: Vec<DisasterNeed> = self
            .countries
            .iter()
            .flat_map(|(country, report)| {
                report
                    .disasters
                    .iter()
                    .map(move |(disaster_type, entry)| (country, disaster_type, entry))
            })
            .filter(|(country, disaster_type, _)| {
                DisasterKey::new(country.as_str(), disaster_type.as_str()).id() == disaster_id
            })
            .map(|(country, disaster_type, entry)| to_need(country, disaster_type, entry))
            .collect();

        match matches.len() {
            0 => NeedLookup::Missing,
            1 => NeedLookup::Found(matches.remove(0)),
            _ => NeedLookup::Ambiguous(matches.into_iter().map(|need| need.key).collect()),
        }
    }

    /// 写回需求状态
    ///
    /// # 参数
    /// - need: 更新后的需求
    /// - fully_served: 是否已全部满足
    ///
    /// # 返回
    /// - true: 找到并写回
    /// - false: 报告中不存在该灾情
    ///
    /// # 规则
    /// - 未满足: 仅更新 supplies
    /// - 已满足: 删除灾情、国家计数 -1、国家计数归零时删除国家、总计数 -1
    pub fn write_back(&mut self, need: &DisasterNeed, fully_served: bool) -> bool {
        let country_name = need.key.country.as_str();
        let Some(country) = self.countries.get_mut(country_name) else {
            return false;
        };

        if !fully_served {
            return match country.disasters.get_mut(&need.key.disaster_type) {
                Some(entry) => {
                    entry.supplies = need.remaining;
                    true
                }
                None => false,
            };
        }

        if country.disasters.remove(&need.key.disaster_type).is_none() {
            return false;
        }
        country.total_disasters = country.total_disasters.saturating_sub(1);
        if country.total_disasters == 0 || country.disasters.is_empty() {
            self.countries.remove(country_name);
        }
        self.total_disasters = self.total_disasters.saturating_sub(1);
        true
    }
}

fn to_need(country: &str, disaster_type: &str, entry: &DisasterEntry) -> DisasterNeed {
    DisasterNeed {
        key: DisasterKey::new(country, disaster_type),
        title: entry.title.clone(),
        severity: entry.severity,
        remaining: entry.supplies,
    }
}

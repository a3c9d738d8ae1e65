// ==========================================
// 救灾物资调配系统 - 灾情优先级排序
// ==========================================
// 职责: 活跃灾情需求的展示/处理顺序
// 规则: 严重等级降序 -> 严重分值降序 -> 灾情ID升序 (稳定、可复现)
// ==========================================

use crate::domain::disaster::DisasterNeed;
use std::cmp::Ordering;

#[derive(Debug, Default, Clone, Copy)]
pub struct NeedPrioritySorter {}

impl NeedPrioritySorter {
    pub fn new() -> Self {
        Self {}
    }

    /// 对需求列表排序（就地）
    pub fn sort(&self, needs: &mut [DisasterNeed]) {
        needs.sort_by(compare_needs);
    }
}

fn compare_needs(a: &DisasterNeed, b: &DisasterNeed) -> Ordering {
    b.severity_level()
        .cmp(&a.severity_level())
        .then_with(|| b.severity.total_cmp(&a.severity))
        .then_with(|| a.key.cmp(&b.key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::allocation::AllocationRequest;
    use crate::domain::disaster::DisasterKey;

    fn need(country: &str, disaster_type: &str, severity: f64) -> DisasterNeed {
        DisasterNeed {
            key: DisasterKey::new(country, disaster_type),
            title: String::new(),
            severity,
            remaining: AllocationRequest::default(),
        }
    }

    #[test]
    fn test_sort_by_severity_then_id() {
        let mut needs = vec![
            need("Nepal", "earthquake", 40.0),
            need("India", "flood", 90.0),
            need("Bangladesh", "cyclone", 90.0),
            need("Peru", "landslide", 55.0),
        ];

        NeedPrioritySorter::new().sort(&mut needs);

        let ids: Vec<String> = needs.iter().map(|n| n.id()).collect();
        assert_eq!(
            ids,
            vec![
                "Bangladesh-cyclone",
                "India-flood",
                "Peru-landslide",
                "Nepal-earthquake"
            ]
        );
    }
}

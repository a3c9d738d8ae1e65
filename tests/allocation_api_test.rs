// ==========================================
// 物资分配 API 测试（内存仓储）
// ==========================================
// 职责: 验证完整分配流程、报告写回、错误分类与并发冲突重试
// ==========================================


#[cfg(test)]
mod allocation_api_test {
    use relief_allocation::api::{AllocationApi, ApiError};
    use relief_allocation::domain::{AllocationPlan, AllocationRequest, DisasterReport, InventoryLot};
    use relief_allocation::repository::{
        DisasterReportStore, InMemoryInventory, InMemoryReportStore, InventorySnapshotReader,
        InventoryWriter, RepositoryError, RepositoryResult,
    };
    use relief_allocation::SupplyCategory;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use crate::test_helpers::{lot, sample_inventory, sample_report, utc_date};

    // ==========================================
    // 测试辅助
    // ==========================================

    /// 每次写入前由"其他写入者"先取走首个批次 1 个单位,制造快照过期
    struct ContendedInventory {
        inner: InMemoryInventory,
        contentions: AtomicU32,
    }

    impl ContendedInventory {
        fn new(lots: Vec<InventoryLot>, contentions: u32) -> Self {
            Self {
                inner: InMemoryInventory::new(lots),
                contentions: AtomicU32::new(contentions),
            }
        }
    }

    impl InventorySnapshotReader for ContendedInventory {
        fn snapshot(&self) -> RepositoryResult<Vec<InventoryLot>> {
            self.inner.snapshot()
        }
    }

    impl InventoryWriter for ContendedInventory {
        fn apply_deductions(&self, plan: &AllocationPlan) -> RepositoryResult<usize> {
            let remaining = self.contentions.load(Ordering::SeqCst);
            if remaining > 0 {
                self.contentions.store(remaining - 1, Ordering::SeqCst);
                if let Some(deduction) = plan.deductions().next() {
                    let current = self.inner.get(&deduction.lot_id)?.ok_or_else(|| {
                        RepositoryError::NotFound {
                            entity: "inventory_lot".to_string(),
                            id: deduction.lot_id.clone(),
                        }
                    })?;
                    self.inner
                        .set_quantity(&deduction.lot_id, current.quantity - 1.0)?;
                }
            }
            self.inner.apply_deductions(plan)
        }
    }

    fn setup(
        lots: Vec<InventoryLot>,
    ) -> (Arc<AllocationApi>, Arc<InMemoryInventory>, Arc<InMemoryReportStore>) {
        let inventory = Arc::new(InMemoryInventory::new(lots));
        let report_store = Arc::new(InMemoryReportStore::new(sample_report()));
        let api = Arc::new(AllocationApi::new(
            inventory.clone(),
            report_store.clone(),
            None,
            3,
        ));
        (api, inventory, report_store)
    }

    fn quantity(inventory: &InMemoryInventory, lot_id: &str) -> f64 {
        inventory.get(lot_id).unwrap().unwrap().quantity
    }

    // ==========================================
    // 查询
    // ==========================================

    #[tokio::test]
    async fn test_list_active_needs_sorted_by_severity() {
        let (api, _, _) = setup(sample_inventory());
        let ids: Vec<String> = api
            .list_active_needs()
            .await
            .unwrap()
            .iter()
            .map(|n| n.id())
            .collect();
        assert_eq!(ids, vec!["India-flood", "Sri-Lanka-landslide", "India-cyclone"]);
    }

    #[tokio::test]
    async fn test_preview_does_not_write() {
        let (api, inventory, report_store) = setup(sample_inventory());

        let preview = api.preview("India-flood", None).await.unwrap();
        assert_eq!(preview.plan.allocated(SupplyCategory::Water), 15.0);
        assert_eq!(preview.remaining_after.medicine, 8.0);
        assert!(!preview.would_resolve);

        assert_eq!(quantity(&inventory, "W-A"), 10.0);
        assert_eq!(report_store.load().await.unwrap(), sample_report());
    }

    // ==========================================
    // 分配流程
    // ==========================================

    #[tokio::test]
    async fn test_partial_then_resolved_allocation() {
        let (api, inventory, report_store) = setup(sample_inventory());

        // 第一次: 食品 40/100、水 15/15、药品 12/20、帐篷 0/5
        let first = api.allocate_remaining("India-flood", "tester").await.unwrap();
        assert!(!first.fully_served);
        assert_eq!(first.attempts, 1);
        assert_eq!(first.remaining, AllocationRequest::new(60.0, 0.0, 8.0, 5.0));
        assert_eq!(quantity(&inventory, "W-A"), 0.0);
        assert_eq!(quantity(&inventory, "W-B"), 5.0);
        assert_eq!(quantity(&inventory, "F-1"), 0.0);

        let report = report_store.load().await.unwrap();
        let entry = &report.countries["India"].disasters["flood"];
        assert_eq!(entry.supplies, AllocationRequest::new(60.0, 0.0, 8.0, 5.0));
        assert_eq!(entry.extra["coordinates"], serde_json::json!([26.2, 92.9]));
        assert_eq!(report.total_disasters, 3);

        // 补货后第二次分配全部满足
        inventory.push(lot("F-2", "food", 80.0, None)).unwrap();
        inventory
            .push(lot("M-3", "Medical", 10.0, Some(utc_date(2024, 4, 1))))
            .unwrap();
        inventory.push(lot("S-1", "shelter", 5.0, None)).unwrap();

        let second = api.allocate_remaining("India-flood", "tester").await.unwrap();
        assert!(second.fully_served);
        assert!(second.remaining.is_zero());
        assert_eq!(quantity(&inventory, "F-2"), 20.0);
        assert_eq!(quantity(&inventory, "M-3"), 2.0);

        let report = report_store.load().await.unwrap();
        let india = &report.countries["India"];
        assert!(!india.disasters.contains_key("flood"));
        assert_eq!(india.total_disasters, 1);
        assert_eq!(report.total_disasters, 2);
        assert_eq!(report.extra["generated_at"], "2024-03-01T00:00:00Z");
    }

    #[tokio::test]
    async fn test_zero_need_resolves_and_prunes_country() {
        let (api, _, report_store) = setup(sample_inventory());

        let outcome = api
            .allocate_remaining("Sri-Lanka-landslide", "tester")
            .await
            .unwrap();
        assert!(outcome.fully_served);
        assert!(outcome.plan.categories.is_empty());

        let report = report_store.load().await.unwrap();
        assert!(!report.countries.contains_key("Sri-Lanka"));
        assert_eq!(report.total_disasters, 2);
    }

    #[tokio::test]
    async fn test_explicit_request_smaller_than_need() {
        let (api, inventory, report_store) = setup(sample_inventory());

        let outcome = api
            .allocate(
                "India-flood",
                AllocationRequest::single(SupplyCategory::Water, 4.0),
                "tester",
            )
            .await
            .unwrap();
        assert!(!outcome.fully_served);
        assert_eq!(outcome.remaining.water, 11.0);
        assert_eq!(outcome.remaining.food, 100.0);
        assert_eq!(quantity(&inventory, "W-A"), 6.0);

        let report = report_store.load().await.unwrap();
        assert_eq!(report.countries["India"].disasters["flood"].supplies.water, 11.0);
    }

    // ==========================================
    // 错误分类
    // ==========================================

    #[tokio::test]
    async fn test_unknown_disaster_is_not_found() {
        let (api, _, _) = setup(sample_inventory());
        let err = api.allocate_remaining("Atlantis-flood", "tester").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = api.preview("India-earthquake", None).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_colliding_disaster_id_is_rejected() {
        let report: DisasterReport = serde_json::from_str(
            r#"{
                "countries": {
                    "A-B": {"total_disasters": 1, "disasters": {"c": {"title": "x", "severity": 50, "supplies": {"water": 5}}}},
                    "A": {"total_disasters": 1, "disasters": {"B-c": {"title": "y", "severity": 70, "supplies": {"water": 5}}}}
                },
                "total_disasters": 2
            }"#,
        )
        .unwrap();
        let inventory = Arc::new(InMemoryInventory::new(sample_inventory()));
        let report_store = Arc::new(InMemoryReportStore::new(report.clone()));
        let api = AllocationApi::new(inventory.clone(), report_store.clone(), None, 3);

        let err = api.allocate_remaining("A-B-c", "tester").await.unwrap_err();
        match err {
            ApiError::InvalidInput(msg) => {
                assert!(msg.contains("A-B/c"));
                assert!(msg.contains("A/B-c"));
            }
            other => panic!("expected InvalidInput, got {:?}", other),
        }
        assert!(matches!(
            api.preview("A-B-c", None).await.unwrap_err(),
            ApiError::InvalidInput(_)
        ));
        // 未做任何写入
        assert_eq!(inventory.snapshot().unwrap(), sample_inventory());
        assert_eq!(report_store.load().await.unwrap(), report);
    }

    #[tokio::test]
    async fn test_invalid_request_writes_nothing() {
        let (api, inventory, report_store) = setup(sample_inventory());

        let err = api
            .allocate(
                "India-flood",
                AllocationRequest::new(1.0, -3.0, 0.0, 0.0),
                "tester",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
        assert_eq!(inventory.snapshot().unwrap(), sample_inventory());
        assert_eq!(report_store.load().await.unwrap(), sample_report());
    }

    #[tokio::test]
    async fn test_negative_lot_is_inventory_inconsistency() {
        let mut lots = sample_inventory();
        lots.push(lot("BAD", "shelter", -2.0, None));
        let (api, _, _) = setup(lots);

        let err = api.allocate_remaining("India-flood", "tester").await.unwrap_err();
        assert!(matches!(err, ApiError::InventoryInconsistency(ref msg) if msg.contains("BAD")));
    }

    // ==========================================
    // 并发控制
    // ==========================================

    #[tokio::test]
    async fn test_stale_snapshot_is_retried() {
        let inventory = Arc::new(ContendedInventory::new(sample_inventory(), 1));
        let api = AllocationApi::new(
            inventory.clone(),
            Arc::new(InMemoryReportStore::new(sample_report())),
            None,
            3,
        );

        let outcome = api
            .allocate(
                "India-flood",
                AllocationRequest::single(SupplyCategory::Water, 15.0),
                "tester",
            )
            .await
            .unwrap();
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.plan.allocated(SupplyCategory::Water), 15.0);

        // 其他写入者取走 W-A 的 1 个单位后,按新快照重新规划
        assert_eq!(inventory.inner.get("W-A").unwrap().unwrap().quantity, 0.0);
        assert_eq!(inventory.inner.get("W-B").unwrap().unwrap().quantity, 4.0);
    }

    #[tokio::test]
    async fn test_persistent_conflict_gives_up() {
        let inventory = Arc::new(ContendedInventory::new(sample_inventory(), u32::MAX));
        let report_store = Arc::new(InMemoryReportStore::new(sample_report()));
        let api = AllocationApi::new(inventory.clone(), report_store.clone(), None, 3);

        let err = api
            .allocate(
                "India-flood",
                AllocationRequest::single(SupplyCategory::Water, 5.0),
                "tester",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ConcurrencyConflict { attempts: 3, .. }));

        // 本流程的扣减一次都没有提交,报告保持不变
        assert_eq!(inventory.inner.get("W-A").unwrap().unwrap().quantity, 7.0);
        assert_eq!(report_store.load().await.unwrap(), sample_report());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_allocations_never_overdraw() {
        let (api, inventory, report_store) = setup(vec![
            lot("W-A", "water", 10.0, Some(utc_date(2024, 1, 1))),
            lot("W-B", "water", 10.0, Some(utc_date(2024, 6, 1))),
        ]);

        let flood = {
            let api = api.clone();
            tokio::spawn(async move {
                api.allocate(
                    "India-flood",
                    AllocationRequest::single(SupplyCategory::Water, 15.0),
                    "team-a",
                )
                .await
            })
        };
        let cyclone = {
            let api = api.clone();
            tokio::spawn(async move { api.allocate_remaining("India-cyclone", "team-b").await })
        };

        let flood = flood.await.unwrap().unwrap();
        let cyclone = cyclone.await.unwrap().unwrap();
        assert_eq!(flood.plan.allocated(SupplyCategory::Water), 15.0);
        assert_eq!(cyclone.plan.allocated(SupplyCategory::Water), 4.0);
        assert!(cyclone.fully_served);

        let left: f64 = inventory.snapshot().unwrap().iter().map(|l| l.quantity).sum();
        assert_eq!(left, 1.0);

        let report = report_store.load().await.unwrap();
        assert!(!report.countries["India"].disasters.contains_key("cyclone"));
        assert_eq!(report.countries["India"].disasters["flood"].supplies.water, 0.0);
    }
}

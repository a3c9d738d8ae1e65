// ==========================================
// 持久化分配端到端测试
// ==========================================
// 职责: AppState(SQLite 库存 + JSON 报告) 上的完整分配流程与生命周期
// ==========================================


#[cfg(test)]
mod persistent_allocation_e2e_test {
    use relief_allocation::api::ApiError;
    use relief_allocation::app::AppState;
    use relief_allocation::domain::{AllocationRequest, NewSupplyLot};
    use relief_allocation::SupplyCategory;
    use tempfile::TempDir;

    use crate::test_helpers::{read_report_json, utc_date, write_sample_report};

    fn open_state(dir: &TempDir) -> AppState {
        relief_allocation::logging::init_test();
        let db_path = dir.path().join("relief.db").to_string_lossy().to_string();
        let report_path = dir.path().join("disaster_allocations_report.json");
        AppState::with_report_path(db_path, &report_path.to_string_lossy()).unwrap()
    }

    fn stock(state: &AppState, name: &str, category: &str, quantity: f64, year: Option<i32>) -> String {
        state
            .supply_api
            .add_lot(
                NewSupplyLot {
                    name: name.to_string(),
                    category: category.to_string(),
                    quantity,
                    unit: "units".to_string(),
                    location: "Depot 1".to_string(),
                    expiration_date: year.map(|y| utc_date(y, 1, 1)),
                },
                "tester",
            )
            .unwrap()
            .lot_id
    }

    #[tokio::test]
    async fn test_allocation_persists_across_restart() {
        let dir = TempDir::new().unwrap();
        let report_path = write_sample_report(dir.path()).unwrap();

        let state = open_state(&dir);
        let water_old = stock(&state, "Bottled Water", "water", 10.0, Some(2024));
        let water_new = stock(&state, "Bottled Water", "water", 10.0, Some(2025));
        let meds = stock(&state, "First Aid", "medicine", 12.0, None);

        let outcome = state
            .allocation_api
            .allocate(
                "India-flood",
                AllocationRequest::new(0.0, 15.0, 20.0, 5.0),
                "field-officer",
            )
            .await
            .unwrap();
        assert!(!outcome.fully_served);
        assert_eq!(outcome.plan.allocated(SupplyCategory::Water), 15.0);
        assert_eq!(outcome.plan.allocated(SupplyCategory::Medicine), 12.0);
        assert_eq!(outcome.plan.allocated(SupplyCategory::Shelter), 0.0);

        // 库存落库
        let lots = &state.supply_api;
        assert_eq!(lots.get_lot(&water_old).unwrap().quantity, 0.0);
        assert_eq!(lots.get_lot(&water_new).unwrap().quantity, 5.0);
        assert_eq!(lots.get_lot(&meds).unwrap().quantity, 0.0);
        assert_eq!(lots.get_lot(&water_old).unwrap().revision, 1);

        // 报告落盘: 嵌套结构 + 未知字段保留
        let json = read_report_json(&report_path).unwrap();
        let flood = &json["countries"]["India"]["disasters"]["flood"];
        assert_eq!(flood["supplies"]["water"], 0.0);
        assert_eq!(flood["supplies"]["medicine"], 8.0);
        assert_eq!(flood["supplies"]["food"], 100.0);
        assert_eq!(flood["coordinates"][0], 26.2);
        assert_eq!(json["total_disasters"], 3);

        // 操作日志
        let logs = state.action_log_repo.find_by_disaster("India-flood").unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action_type, "ALLOCATE");
        assert_eq!(logs[0].actor, "field-officer");

        state.shutdown().unwrap();

        // 重启后继续分配
        let state = open_state(&dir);
        assert_eq!(state.supply_api.get_lot(&water_new).unwrap().quantity, 5.0);
        stock(&state, "Rice", "food", 100.0, Some(2026));
        stock(&state, "Antibiotics", "medical", 8.0, Some(2026));
        stock(&state, "Tents", "shelter", 5.0, None);

        let outcome = state
            .allocation_api
            .allocate_remaining("India-flood", "field-officer")
            .await
            .unwrap();
        assert!(outcome.fully_served);

        let json = read_report_json(&report_path).unwrap();
        assert!(json["countries"]["India"]["disasters"].get("flood").is_none());
        assert_eq!(json["countries"]["India"]["total_disasters"], 1);
        assert_eq!(json["total_disasters"], 2);

        let logs = state.action_log_repo.find_by_disaster("India-flood").unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[1].action_type, "RESOLVE");

        // 已移除的灾情再次分配 -> NotFound
        let err = state
            .allocation_api
            .allocate_remaining("India-flood", "field-officer")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        state.shutdown().unwrap();
    }

    #[tokio::test]
    async fn test_missing_report_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let state = open_state(&dir);

        let err = state.allocation_api.list_active_needs().await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        state.shutdown().unwrap();
    }

    #[tokio::test]
    async fn test_resolving_last_disaster_prunes_country() {
        let dir = TempDir::new().unwrap();
        let report_path = write_sample_report(dir.path()).unwrap();
        let state = open_state(&dir);

        let outcome = state
            .allocation_api
            .allocate_remaining("Sri-Lanka-landslide", "tester")
            .await
            .unwrap();
        assert!(outcome.fully_served);

        let json = read_report_json(&report_path).unwrap();
        assert!(json["countries"].get("Sri-Lanka").is_none());
        assert_eq!(json["total_disasters"], 2);
        assert_eq!(json["generated_at"], "2024-03-01T00:00:00Z");

        let needs = state.allocation_api.list_active_needs().await.unwrap();
        assert_eq!(needs.len(), 2);
        state.shutdown().unwrap();
    }
}

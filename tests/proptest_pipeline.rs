use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use proptest::test_runner::Config;
use reportforge::features::normalize_features;
use reportforge::{
    analyze_report_usage, extract_features, fit_kmeans, AnalysisConfig, ReportRecord, Tier,
};

/// (account index, completion hours, creation day offset)
fn report_specs() -> impl Strategy<Value = Vec<(u8, i64, i64)>> {
    prop::collection::vec((0u8..8, -2i64..48, 0i64..30), 1..60)
}

fn build_records(specs: &[(u8, i64, i64)]) -> Vec<ReportRecord> {
    let base = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
    specs
        .iter()
        .enumerate()
        .map(|(i, &(account, hours, day))| {
            let created = base + Duration::days(day);
            ReportRecord {
                report_id: format!("R-{i}"),
                creation_date: created,
                completion_date: created + Duration::hours(hours),
                report_start_date: base,
                report_end_date: base + Duration::days(30),
                accounts: "Shared Office".to_string(),
                account_members: format!("M-{account}"),
            }
        })
        .collect()
}

fn config(clusters: usize, seed: u64) -> AnalysisConfig {
    AnalysisConfig {
        clusters,
        seed,
        ..AnalysisConfig::default()
    }
}

proptest! {
    #![proptest_config(Config::with_cases(96))]

    #[test]
    fn report_counts_cover_every_record(specs in report_specs()) {
        let records = build_records(&specs);
        let features = extract_features(&records).unwrap();

        let total: usize = features.iter().map(|f| f.reports_count).sum();
        prop_assert_eq!(total, records.len());

        let mut ids: Vec<&str> = features.iter().map(|f| f.account_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), features.len());
        prop_assert!(features.iter().all(|f| f.reports_count >= 1 && f.report_frequency > 0.0));
    }

    #[test]
    fn labels_stay_within_cluster_range(
        specs in report_specs(),
        clusters in 1usize..=5,
        seed in any::<u64>()
    ) {
        let features = extract_features(&build_records(&specs)).unwrap();
        let matrix = normalize_features(&features, 100.0).unwrap();
        let params = config(clusters, seed).kmeans_params();
        let model = fit_kmeans(&matrix, &params).unwrap();

        prop_assert_eq!(model.labels.len(), features.len());
        prop_assert!(model.labels.iter().all(|&l| l < clusters));
        prop_assert_eq!(model.centroids.nrows(), clusters);
        prop_assert_eq!(model.displacement_history.len(), model.iterations);
        if model.converged {
            // The loop stops at the first step under tolerance
            let first_below = model
                .displacement_history
                .iter()
                .position(|&d| d < params.tolerance);
            prop_assert_eq!(first_below, Some(model.iterations - 1));
        }
    }

    #[test]
    fn tiers_are_unique_at_the_top(
        specs in report_specs(),
        clusters in 1usize..=5,
        seed in any::<u64>()
    ) {
        let records = build_records(&specs);
        let result = analyze_report_usage(&records, &config(clusters, seed)).unwrap();

        prop_assert_eq!(result.clusters.len(), clusters);
        prop_assert_eq!(
            result.total_accounts,
            extract_features(&records).unwrap().len()
        );
        prop_assert_eq!(result.clusters_with_tier(Tier::High).count(), 1);
        prop_assert!(result.clusters_with_tier(Tier::Medium).count() <= 1);
        for cluster in &result.clusters {
            prop_assert_eq!(cluster.tier.is_some(), cluster.account_count > 0);
        }

        let high = result.clusters_with_tier(Tier::High).next().unwrap().score;
        let tie_epsilon = AnalysisConfig::default().tie_epsilon;
        for cluster in result.clusters.iter().filter(|c| c.tier.is_some()) {
            prop_assert!(cluster.score < high + tie_epsilon);
        }
    }

    #[test]
    fn seeded_runs_are_identical(
        specs in report_specs(),
        clusters in 1usize..=5,
        seed in any::<u64>()
    ) {
        let records = build_records(&specs);
        let config = config(clusters, seed);
        let at = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        let analyzer = reportforge::UsageAnalyzer::new(config).unwrap();

        let first = analyzer.analyze_at(&records, at).unwrap();
        let second = analyzer.analyze_at(&records, at).unwrap();
        prop_assert_eq!(first, second);
    }
}

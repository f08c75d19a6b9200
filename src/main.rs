//! ReportForge: account usage segmentation CLI
//!
//! Loads report records, applies the optional filter, runs the clustering
//! analysis and prints the tiered clusters with their insights.

use anyhow::{Context, Result};
use clap::Parser;
use reportforge::{load_reports, AnalysisResult, Args, UsageAnalyzer};
use std::time::Instant;
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();
    let logger = build_logger(args.verbose);

    let start_time = Instant::now();

    let filter = args.report_filter()?;
    let records = load_reports(&args.input)
        .with_context(|| format!("failed to load reports from {}", args.input))?;
    let loaded = records.len();
    let records = filter.apply(records)?;

    if args.verbose {
        eprintln!(
            "Loaded {} reports from {} ({} after filtering)",
            loaded,
            args.input,
            records.len()
        );
    }

    let analyzer = UsageAnalyzer::new(args.analysis_config())?.with_logger(logger);
    let result = analyzer
        .analyze(&records)
        .with_context(|| format!("analysis of {} failed", args.input))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result, args.verbose);
    }

    if args.verbose {
        eprintln!("Total processing time: {:.2}s", start_time.elapsed().as_secs_f64());
    }

    Ok(())
}

/// Stderr subscriber; `RUST_LOG` overrides the verbosity-derived default
fn build_logger(verbose: bool) -> Dispatch {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    Dispatch::new(subscriber)
}

fn print_summary(result: &AnalysisResult, verbose: bool) {
    println!("=== Report Usage Clustering ===");
    println!(
        "Analyzed {} accounts at {}",
        result.total_accounts,
        result.analyzed_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    println!("\n=== Cluster Statistics ===");
    for cluster in &result.clusters {
        let tier = cluster.tier.map_or("-", |t| t.as_str());
        let percentage = if result.total_accounts == 0 {
            0.0
        } else {
            cluster.account_count as f64 / result.total_accounts as f64 * 100.0
        };
        println!(
            "Cluster {} [{}]: {} accounts ({:.1}%), avg completion {:.2}h, {:.2} reports/day",
            cluster.cluster,
            tier,
            cluster.account_count,
            percentage,
            cluster.average_completion_hours,
            cluster.average_reports_per_day
        );
        if verbose && !cluster.accounts.is_empty() {
            println!("  Accounts: {}", cluster.accounts.join(", "));
        }
    }

    println!("\n=== Insights ===");
    for insight in &result.insights {
        println!("- {}", insight);
    }

    let diagnostics = &result.diagnostics;
    println!(
        "\nIterations: {}{}",
        diagnostics.iterations,
        if diagnostics.converged { "" } else { " (iteration cap reached)" }
    );
    println!("Silhouette score (sample): {:.3}", diagnostics.silhouette);
    println!("Within-cluster sum of squares: {:.4}", diagnostics.inertia);
}

//! Narrative insights for tiered clusters

use crate::pipeline::ClusterSummary;
use crate::tier::Tier;

/// Build one insight per tier present, ordered High, Medium, Low.
///
/// When several clusters share a tier (only possible with more than three
/// clusters) their accounts are pooled into a single insight.
pub fn generate_insights(clusters: &[ClusterSummary]) -> Vec<String> {
    [Tier::High, Tier::Medium, Tier::Low]
        .into_iter()
        .filter_map(|tier| {
            let members: Vec<&ClusterSummary> = clusters
                .iter()
                .filter(|c| c.tier == Some(tier) && c.account_count > 0)
                .collect();
            if members.is_empty() {
                return None;
            }

            let account_count: usize = members.iter().map(|c| c.account_count).sum();
            let reports_per_day = members
                .iter()
                .map(|c| c.average_reports_per_day * c.account_count as f64)
                .sum::<f64>()
                / account_count as f64;

            Some(insight_for(tier, account_count, reports_per_day))
        })
        .collect()
}

fn insight_for(tier: Tier, account_count: usize, reports_per_day: f64) -> String {
    match tier {
        Tier::High => format!(
            "High-performance accounts ({account_count} accounts) submit an average of \
             {reports_per_day:.1} reports per day. These accounts might benefit from advanced \
             features or early access to new capabilities. Examine what makes these accounts \
             successful: their workflows and practices could be used as best practices."
        ),
        Tier::Medium => format!(
            "Medium-performance accounts ({account_count} accounts) could use targeted training \
             or workflow improvements to improve efficiency. Identify the specific bottlenecks \
             preventing them from reaching high performance."
        ),
        Tier::Low => format!(
            "Low-performance accounts ({account_count} accounts) might benefit from additional \
             training or engagement initiatives. Investigate the root causes: lack of training, \
             technical issues, or process inefficiencies."
        ),
    }
}

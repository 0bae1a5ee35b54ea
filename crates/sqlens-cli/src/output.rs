//! Terminal rendering of analysis results, plans and the rule catalog

use anyhow::Result;
use clap::ValueEnum;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use serde::Serialize;
use sqlens_analyzer::{
    AntiPatternDetector, ImpactScore, RecommendationRef, RewriteEngine, Severity,
    VerificationStatus,
};
use sqlens_core::{PlanNode, PlanTree};
use sqlens_services::{AnalysisResult, RecommendationBenchmark};
use std::fmt::Write;

/// How results are printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable tables
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(header.iter().map(|h| Cell::new(h).fg(Color::Cyan)));
    table
}

fn severity_cell(severity: Severity) -> Cell {
    let color = match severity {
        Severity::Critical => Color::Red,
        Severity::Warning => Color::Yellow,
        Severity::Info => Color::Blue,
    };
    Cell::new(severity.as_str()).fg(color)
}

fn verification_label(score: &ImpactScore) -> String {
    match &score.verification {
        VerificationStatus::NotRequested => "-".to_string(),
        VerificationStatus::Verified => "verified".to_string(),
        VerificationStatus::Unverified { reason } => format!("unverified: {}", reason),
    }
}

fn score_cells(score: Option<&ImpactScore>) -> [Cell; 3] {
    match score {
        Some(score) => [
            Cell::new(format!("{:.2} ({})", score.value, score.level.as_str())),
            Cell::new(score.provenance.as_str()),
            Cell::new(verification_label(score)),
        ],
        None => [Cell::new("-"), Cell::new("-"), Cell::new("-")],
    }
}

fn format_ms(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |ms| format!("{:.3}", ms))
}

fn recommendation_label(recommendation: RecommendationRef) -> String {
    match recommendation {
        RecommendationRef::IndexCandidate(i) => format!("index #{}", i + 1),
        RecommendationRef::RewriteSuggestion(i) => format!("rewrite #{}", i + 1),
    }
}

fn benchmark_row(benchmark: &RecommendationBenchmark) -> Vec<Cell> {
    let baseline = benchmark.baseline().and_then(|r| r.median_ms());
    let optimized = benchmark.optimized().and_then(|r| r.median_ms());
    let improvement = benchmark
        .optimized()
        .and_then(|r| r.improvement_percent)
        .map_or_else(|| "-".to_string(), |p| format!("{:+.1}%", p));
    let outcome = match benchmark.failure_reason() {
        None => Cell::new("valid").fg(Color::Green),
        Some(reason) => Cell::new(format!("invalid: {}", reason)).fg(Color::Red),
    };
    vec![
        Cell::new(recommendation_label(benchmark.recommendation)),
        Cell::new(format_ms(baseline)),
        Cell::new(format_ms(optimized)),
        Cell::new(improvement),
        outcome,
    ]
}

/// Findings, recommendations and benchmarks as tables
pub fn analysis_report(result: &AnalysisResult) -> String {
    let analysis = &result.analysis;
    let mut out = String::new();
    let _ = writeln!(out, "{}", analysis.summary);
    let _ = writeln!(out, "Normalized: {}", analysis.normalized_sql);

    if !analysis.findings.is_empty() {
        let mut table = new_table(&["Severity", "Rule", "Scope", "Message"]);
        for finding in analysis.sorted_findings() {
            table.add_row(vec![
                severity_cell(finding.severity),
                Cell::new(&finding.rule),
                Cell::new(finding.scope),
                Cell::new(&finding.message),
            ]);
        }
        let _ = writeln!(out, "\nFindings\n{}", table);
    }

    if !analysis.index_candidates.is_empty() {
        let mut table = new_table(&["#", "Index", "Confidence", "Impact", "Provenance", "Verification"]);
        for (i, candidate) in analysis.index_candidates.iter().enumerate() {
            let mut row = vec![
                Cell::new(i + 1),
                Cell::new(&candidate.ddl),
                Cell::new(format!("{:?}", candidate.confidence).to_lowercase()),
            ];
            row.extend(score_cells(
                result.score_for(RecommendationRef::IndexCandidate(i)),
            ));
            table.add_row(row);
        }
        let _ = writeln!(out, "\nIndex candidates\n{}", table);
    }

    if !analysis.rewrite_suggestions.is_empty() {
        let mut table = new_table(&[
            "#",
            "Rule",
            "Rewritten SQL",
            "Equivalence",
            "Impact",
            "Provenance",
            "Verification",
        ]);
        for (i, suggestion) in analysis.rewrite_suggestions.iter().enumerate() {
            let mut row = vec![
                Cell::new(i + 1),
                Cell::new(&suggestion.rule),
                Cell::new(&suggestion.rewritten_sql),
                Cell::new(format!(
                    "{}\n{}",
                    suggestion.equivalence.as_str(),
                    suggestion.precondition
                )),
            ];
            row.extend(score_cells(
                result.score_for(RecommendationRef::RewriteSuggestion(i)),
            ));
            table.add_row(row);
        }
        let _ = writeln!(out, "\nRewrite suggestions\n{}", table);
    }

    if let Some(benchmarks) = result.benchmarks.as_ref().filter(|b| !b.is_empty()) {
        let mut table = new_table(&[
            "Recommendation",
            "Baseline median (ms)",
            "Optimized median (ms)",
            "Improvement",
            "Result",
        ]);
        for benchmark in benchmarks {
            table.add_row(benchmark_row(benchmark));
        }
        let _ = writeln!(out, "\nBenchmarks\n{}", table);
    }

    if !analysis.warnings.is_empty() {
        let _ = writeln!(out, "\nWarnings");
        for warning in &analysis.warnings {
            let _ = writeln!(out, "  - {}", warning);
        }
    }

    out
}

fn write_plan_node(out: &mut String, node: &PlanNode, depth: usize) {
    let mut line = format!("{}{:?}", "  ".repeat(depth), node.node_type);
    if let Some(relation) = &node.relation {
        let _ = write!(line, " on {}", relation);
    }
    if let Some(index) = &node.index_name {
        let _ = write!(line, " using {}", index);
    }
    if let Some(cond) = &node.index_cond {
        let _ = write!(line, " ({})", cond);
    }
    let _ = writeln!(out, "{}  -- {}", line, node.detail);
    for child in &node.children {
        write_plan_node(out, child, depth + 1);
    }
}

/// Indented plan tree, one node per line
pub fn plan_report(plan: &PlanTree) -> String {
    let mut out = String::new();
    write_plan_node(&mut out, &plan.root, 0);
    let indexes = plan.indexes_used();
    if indexes.is_empty() {
        let _ = writeln!(out, "\nNo indexes used");
    } else {
        let _ = writeln!(out, "\nIndexes used: {}", indexes.join(", "));
    }
    out
}

/// One registered rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleInfo {
    pub kind: &'static str,
    pub id: &'static str,
    pub name: &'static str,
}

/// Every built-in detector and rewrite rule, ordered by id
pub fn rule_catalog() -> Vec<RuleInfo> {
    let mut rules: Vec<RuleInfo> = AntiPatternDetector::new()
        .rules()
        .map(|rule| RuleInfo {
            kind: "anti_pattern",
            id: rule.id(),
            name: rule.name(),
        })
        .chain(RewriteEngine::new().rules().map(|rule| RuleInfo {
            kind: "rewrite",
            id: rule.id(),
            name: rule.name(),
        }))
        .collect();
    rules.sort_by(|a, b| a.id.cmp(b.id));
    rules
}

pub fn rules_report(rules: &[RuleInfo]) -> String {
    let mut table = new_table(&["Id", "Kind", "Name"]);
    for rule in rules {
        table.add_row(vec![rule.id, rule.kind, rule.name]);
    }
    table.to_string()
}

#[cfg(test)]
mod tests;

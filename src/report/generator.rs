//! Markdown and JSON dashboard reports.
//!
//! The Markdown report is what `edudash` prints by default: the role's key
//! figures, each breakdown the role may see, and the weekly activity trend.

use crate::dashboard::DashboardData;
use crate::models::{Breakdown, RoleStats, TrendPoint};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

const TREND_BAR_WIDTH: usize = 30;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(data: &DashboardData) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {} Dashboard\n\n", data.role.label()));
    output.push_str(&generate_status_section(data));
    output.push_str(&generate_stats_section(&data.view_model.stats));

    for breakdown in &data.view_model.breakdowns {
        output.push_str(&generate_breakdown_section(breakdown));
    }

    output.push_str(&generate_trend_section(&data.view_model.trends));
    output.push_str(&generate_footer());

    output
}

fn generate_status_section(data: &DashboardData) -> String {
    let mut section = String::new();
    let view = &data.view_model;

    section.push_str(&format!(
        "- **Generated:** {}\n",
        view.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Role:** {}\n", data.role.label()));

    let status = if data.all_sources_failed {
        "⛔ Offline: the LMS could not be reached, all figures are sample data"
    } else if data.is_degraded {
        "⚠️ Partial: some figures are sample data"
    } else {
        "✅ Live"
    };
    section.push_str(&format!("- **Status:** {}\n", status));

    if data.is_degraded {
        section.push_str(&format!(
            "- **Sample data for:** {}\n",
            view.degraded_sources.join(", ")
        ));
    }
    section.push('\n');

    section
}

/// Label/value pairs for a stats block, in display order.
fn stat_rows(stats: &RoleStats) -> Vec<(&'static str, String)> {
    let pct = |v: u32| format!("{}%", v);
    let grade = |v: f64| format!("{:.1}", v);

    match stats {
        RoleStats::Admin(s) => vec![
            ("Users", s.total_users.to_string()),
            ("Active users", s.active_users.to_string()),
            ("Courses", s.total_courses.to_string()),
            ("Categories", s.total_categories.to_string()),
            ("Enrolments", s.total_enrollments.to_string()),
            ("Completion rate", pct(s.completion_rate)),
            ("Engagement rate", pct(s.engagement_rate)),
            ("Average grade", grade(s.average_grade)),
            ("Pass rate", pct(s.pass_rate)),
            ("Average rating", grade(s.average_rating)),
        ],
        RoleStats::SchoolAdmin(s) => vec![
            ("Users", s.total_users.to_string()),
            ("Active users", s.active_users.to_string()),
            ("Students", s.students.to_string()),
            ("Teachers", s.teachers.to_string()),
            ("Courses", s.total_courses.to_string()),
            ("Categories", s.total_categories.to_string()),
            ("Completion rate", pct(s.completion_rate)),
        ],
        RoleStats::Teacher(s) => vec![
            ("Courses taught", s.courses_taught.to_string()),
            ("Students", s.total_students.to_string()),
            ("Active students", s.active_students.to_string()),
            ("Completion rate", pct(s.completion_rate)),
            ("Engagement rate", pct(s.engagement_rate)),
            ("Average grade", grade(s.average_grade)),
            ("Pass rate", pct(s.pass_rate)),
        ],
        RoleStats::Student(s) => vec![
            ("Enrolled courses", s.enrolled_courses.to_string()),
            ("Completed courses", s.completed_courses.to_string()),
            ("Completion rate", pct(s.completion_rate)),
            ("Average grade", grade(s.average_grade)),
            ("Recent activity", s.recent_activity.to_string()),
        ],
    }
}

fn generate_stats_section(stats: &RoleStats) -> String {
    let mut section = String::new();

    section.push_str("## Key Figures\n\n");
    section.push_str("| Metric | Value |\n");
    section.push_str("|:---|---:|\n");
    for (label, value) in stat_rows(stats) {
        section.push_str(&format!("| {} | {} |\n", label, value));
    }
    section.push('\n');

    section
}

fn generate_breakdown_section(breakdown: &Breakdown) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", breakdown.title));

    if breakdown.items.is_empty() {
        section.push_str("*No data.*\n\n");
        return section;
    }

    let has_total = breakdown.items.iter().any(|i| i.total.is_some());
    let has_average = breakdown.items.iter().any(|i| i.average.is_some());

    let mut header = String::from("| | Count |");
    let mut rule = String::from("|:---|---:|");
    if has_total {
        header.push_str(" Of | % |");
        rule.push_str("---:|---:|");
    }
    if has_average {
        header.push_str(" Avg |");
        rule.push_str("---:|");
    }
    section.push_str(&header);
    section.push('\n');
    section.push_str(&rule);
    section.push('\n');

    for item in &breakdown.items {
        section.push_str(&format!("| {} | {} |", item.label, item.count));
        if has_total {
            section.push_str(&format!(
                " {} | {} |",
                item.total.map(|t| t.to_string()).unwrap_or_default(),
                item.rate.map(|r| format!("{}%", r)).unwrap_or_default()
            ));
        }
        if has_average {
            section.push_str(&format!(
                " {} |",
                item.average.map(|a| format!("{:.1}", a)).unwrap_or_else(|| "-".to_string())
            ));
        }
        section.push('\n');
    }
    section.push('\n');

    section
}

fn generate_trend_section(trends: &[TrendPoint]) -> String {
    if trends.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Weekly Activity\n\n");
    section.push_str("| Week of | Events | |\n");
    section.push_str("|:---|---:|:---|\n");

    let peak = trends.iter().map(|t| t.count).max().unwrap_or(0);
    for point in trends {
        let width = if peak == 0 {
            0
        } else {
            (point.count * TREND_BAR_WIDTH).div_ceil(peak)
        };
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            point.period_start.format("%Y-%m-%d"),
            point.count,
            "█".repeat(width)
        ));
    }
    section.push('\n');

    section
}

fn generate_footer() -> String {
    "---\n\n*Generated by edudash*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(data: &DashboardData) -> Result<String> {
    serde_json::to_string_pretty(data).map_err(Into::into)
}

/// Write a rendered report to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create report file: {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write report file: {}", path.display()))?;

    Ok(())
}

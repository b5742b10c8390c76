//! Output formatting for the operator CLI

use comfy_table::{Cell, Color, ContentArrangement, Row, Table};
use placemeter_core::{
    BudgetConfig, MonthlyAggregate, RequestLogEntry, StatusLevel, UsageSnapshot,
};

/// Format the current usage snapshot as a table or JSON
pub fn format_snapshot(snapshot: &UsageSnapshot, config: &BudgetConfig, json: bool) -> String {
    if json {
        return serde_json::to_string_pretty(snapshot).unwrap_or_else(|_| "{}".to_string());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Month").fg(Color::Cyan),
        Cell::new("Requests").fg(Color::Cyan),
        Cell::new("Cost").fg(Color::Cyan),
        Cell::new("Used").fg(Color::Cyan),
        Cell::new("Status").fg(Color::Cyan),
    ]);

    let status_color = match snapshot.status {
        StatusLevel::Ok => Color::Green,
        StatusLevel::Warning => Color::Yellow,
        StatusLevel::Critical => Color::Red,
        StatusLevel::Exceeded => Color::Magenta,
    };

    table.add_row(Row::from(vec![
        Cell::new(snapshot.month.to_string()),
        Cell::new(format!(
            "{} / {}",
            snapshot.requests_used, config.max_requests_per_month
        )),
        Cell::new(format!(
            "${:.2} / ${:.2}",
            snapshot.cost_used, config.max_cost_per_month
        )),
        Cell::new(format!("{:.1}%", snapshot.percent_used)),
        Cell::new(snapshot.status.to_string()).fg(status_color),
    ]));

    table.to_string()
}

/// Format frozen monthly aggregates, most-recent-first
pub fn format_history(aggregates: &[MonthlyAggregate], json: bool) -> String {
    if json {
        return serde_json::to_string_pretty(aggregates).unwrap_or_else(|_| "[]".to_string());
    }

    if aggregates.is_empty() {
        return "No completed months recorded.".to_string();
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Month").fg(Color::Cyan),
        Cell::new("Requests").fg(Color::Cyan),
        Cell::new("Cost").fg(Color::Cyan),
    ]);

    for agg in aggregates {
        table.add_row(Row::from(vec![
            agg.key.to_string(),
            agg.requests.to_string(),
            format!("${:.2}", agg.cost_usd()),
        ]));
    }

    table.to_string()
}

/// Format request log entries in insertion order
pub fn format_log(entries: &[RequestLogEntry], json: bool) -> String {
    if json {
        return serde_json::to_string_pretty(entries).unwrap_or_else(|_| "[]".to_string());
    }

    if entries.is_empty() {
        return "No matching log entries.".to_string();
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Timestamp").fg(Color::Cyan),
        Cell::new("Endpoint").fg(Color::Cyan),
        Cell::new("Tag").fg(Color::Cyan),
        Cell::new("Cost").fg(Color::Cyan),
        Cell::new("Outcome").fg(Color::Cyan),
    ]);

    for entry in entries {
        let outcome_color = match entry.outcome {
            placemeter_core::Outcome::AllowedSuccess => Color::Green,
            placemeter_core::Outcome::AllowedFailure => Color::Yellow,
            placemeter_core::Outcome::Denied => Color::Red,
        };
        table.add_row(Row::from(vec![
            Cell::new(entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::new(&entry.endpoint),
            Cell::new(&entry.operation_tag),
            Cell::new(format!("${:.4}", entry.cost_usd())),
            Cell::new(entry.outcome.to_string()).fg(outcome_color),
        ]));
    }

    table.to_string()
}

use comfy_table::{
    presets,
    Attribute,
    Cell,
    Color,
    ContentArrangement,
    Table,
};
use drift_monitor_analysis::{
    FeatureDriftRow,
    PerformanceRow,
};

fn header(title: String) -> Vec<Cell> {
    vec![Cell::new(title).add_attribute(Attribute::Bold).fg(Color::Cyan)]
}

fn table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// The dataset drift flag is 0 or 1.
fn drift_score_color(drift_score: u8) -> Color {
    if drift_score == 0 {
        Color::Green
    } else {
        Color::Red
    }
}

/// The last `limit` rows of a performance series, oldest first.
pub fn performance_table(series: &[PerformanceRow], limit: usize) -> Table {
    let mut table = table();
    table.set_header(
        ["Timestamp", "Window", "Accuracy", "Precision", "Recall", "F1", "Drift"]
            .into_iter()
            .map(|title| Cell::new(title).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );

    for row in &series[series.len().saturating_sub(limit)..] {
        table.add_row(vec![
            Cell::new(row.timestamp.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(row.window_size),
            Cell::new(format!("{:.3}", row.accuracy)),
            Cell::new(format!("{:.3}", row.precision)),
            Cell::new(format!("{:.3}", row.recall)),
            Cell::new(format!("{:.3}", row.f1)),
            Cell::new(row.drift_score).fg(drift_score_color(row.drift_score)),
        ]);
    }
    table
}

/// One row per feature of the latest snapshot.
pub fn feature_drift_table(snapshot: &[FeatureDriftRow]) -> Table {
    let mut table = table();
    let taken = snapshot
        .first()
        .map(|row| row.timestamp.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    table.set_header(header(format!("FEATURE DRIFT ({taken})")));

    for row in snapshot {
        let (verdict, color) = if row.drifted {
            ("drifted", Color::Red)
        } else {
            ("stable", Color::Green)
        };
        table.add_row(vec![
            Cell::new(&row.feature_name).add_attribute(Attribute::Bold),
            Cell::new(format!("p = {:.4}", row.drift_score)),
            Cell::new(verdict).fg(color),
        ]);
    }
    table
}

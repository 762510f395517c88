use serde::Serialize;

use crate::metrics::SeriesPoint;

pub fn output_success(message: &str) {
    println!("✓ {}", message);
}

pub fn output_error(message: &str) {
    eprintln!("Error: {}", message);
}

/// Serialize any value as pretty JSON on stdout
pub fn output_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `-` for unknown metrics
pub fn display_metric<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

pub fn print_series(title: &str, points: &[SeriesPoint]) {
    println!("{}:", title);
    if points.is_empty() {
        println!("  (unavailable)");
        return;
    }
    for point in points {
        println!("  {}  {}", point.date.format("%Y-%m-%d"), point.value);
    }
}

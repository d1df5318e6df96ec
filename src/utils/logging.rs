use std::path::Path;
use std::time::Duration;

use crate::pipeline::batch::BatchReport;
use crate::pipeline::{Delivery, FileReport};
use crate::problem::instance::Instance;

pub fn format_log_instance(instance: &Instance) -> String {
    let stats = instance.statistics();
    format!(
        "{} - {} customers, capacity {}, demand {}, relative capacity {}, customers/tour {}",
        instance.instance_uid(),
        stats.num_customers,
        instance.parameters().capacity(),
        stats.total_demand,
        format_optional(stats.relative_vehicle_capacity),
        format_optional(stats.max_mean_customers_per_tour),
    )
}

pub fn format_log_file(source: &Path, report: &FileReport, took: &Duration) -> String {
    let target = match &report.delivery {
        Delivery::Written(path) => format!("written to {}", path.display()),
        Delivery::Kept(path) => format!("kept {}", path.display()),
        Delivery::Uploaded(ack) => match &ack.location {
            Some(location) => format!("uploaded to {}", location),
            None => "uploaded".to_string(),
        },
    };
    format!(
        "{} -> {}: {}, took: {:.2?}",
        source.display(),
        report.instance_uid,
        target,
        took
    )
}

pub fn format_log_batch(report: &BatchReport) -> String {
    format!(
        "{}/{}/{} (attempted/succeeded/failed), skipped lines: {}, took: {:.2?}",
        report.attempted,
        report.succeeded(),
        report.failed(),
        report.skipped_lines,
        report.took
    )
}

fn format_optional(value: Option<f64>) -> String {
    value
        .map(|it| format!("{:.4}", it))
        .unwrap_or_else(|| "-".to_string())
}

use std::{fs, process::Command};

use anyhow::{Context, Result};
use tracing::info;

use crate::error::PipelineError;
use crate::settings::Settings;

/// Substitute the five placeholder tokens in the load-generator script
/// template.
fn render_template(
    template: &str,
    target: &str,
    query_file: &str,
    report_file: &str,
    duration_secs: u64,
    clients: u32,
) -> String {
    template
        .replace("__TARGET__", target)
        .replace("__QUERY_FILE__", query_file)
        .replace("__REPORT_FILE__", report_file)
        .replace("__DURATION__", &duration_secs.to_string())
        .replace("__CLIENTS__", &clients.to_string())
}

/// Template the benchmark script, run it, and print the resulting report
/// verbatim. The load generator itself owns connection handling and timing;
/// this is only glue.
pub fn run(settings: &Settings) -> Result<()> {
    let query_file = settings.query_file();
    let report_file = settings.report_file();

    let template = fs::read_to_string(&settings.bench_template).with_context(|| {
        format!(
            "Failed reading benchmark template {}",
            settings.bench_template.display()
        )
    })?;
    let script = render_template(
        &template,
        &settings.bench_target,
        &query_file.to_string_lossy(),
        &report_file.to_string_lossy(),
        settings.bench_duration_secs,
        settings.n_clients,
    );

    info!(
        "running load generator against {} for {}s with {} clients",
        settings.bench_target, settings.bench_duration_secs, settings.n_clients
    );
    let status = Command::new("sh")
        .arg("-c")
        .arg(&script)
        .status()
        .context("Failed launching load generator")?;
    if !status.success() {
        return Err(
            PipelineError::ExternalService(format!("load generator exited with {status}")).into(),
        );
    }

    let report = fs::read_to_string(&report_file)
        .with_context(|| format!("Failed reading benchmark report {}", report_file.display()))?;
    println!("{report}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_tokens_are_all_replaced() {
        let template = "run __TARGET__ -n __CLIENTS__ -s __DURATION__ \
-q __QUERY_FILE__ -o __REPORT_FILE__";
        let script = render_template(
            template,
            "tutorial",
            "query/sample_query_organization.txt",
            "query/performance_report_organization.txt",
            30,
            5,
        );
        assert_eq!(
            script,
            "run tutorial -n 5 -s 30 -q query/sample_query_organization.txt \
-o query/performance_report_organization.txt"
        );
        assert!(!script.contains("__"));
    }
}

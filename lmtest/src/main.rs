mod report;
mod runner;
mod tests;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use colored::*;
use lmtest_core::topology::{self, Resolution};
use lmtest_core::{BoardStrategy, BringUp, DriverState, HarnessConfig, TargetDescriptor, config};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Human,
    Json,
    Markdown,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// Firmware image injected into the session configuration
    #[arg(long, default_value = "firmware.bin")]
    firmware: PathBuf,

    /// Target descriptor path, overriding place resolution
    #[arg(long, env = "LG_ENV")]
    env: Option<String>,

    /// Place identifier of the form lab-segment-instance
    #[arg(long, env = "LG_PLACE")]
    place: Option<String>,

    /// Repository root holding labnet.yaml and targets/
    #[arg(long, default_value = ".")]
    repo_root: PathBuf,

    /// Local path of the vwifi client binary to upload
    #[arg(long, default_value = "vwifi/vwifi-client")]
    client_binary: PathBuf,

    /// Deadline in seconds for the mesh interface to appear
    #[arg(long, default_value = "120")]
    mesh_deadline: u64,

    /// Test categories to run (comma-separated: system,mesh,shared-state)
    #[arg(short, long, value_delimiter = ',')]
    tests: Option<Vec<String>>,

    /// Output format
    #[arg(short = 'f', long, default_value = "human")]
    format: OutputFormat,

    /// Output file path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Non-interactive mode (disables progress bars, suitable for nohup/background execution)
    #[arg(long)]
    non_interactive: bool,

    /// Quiet mode (suppress non-critical log output)
    #[arg(short = 'q', long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    let filter = if args.quiet {
        EnvFilter::new("warn")
    } else if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // Check if we're connected to a TTY
    let is_tty = atty::is(atty::Stream::Stdout);
    let non_interactive = args.non_interactive || !is_tty;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    // Print header
    println!(
        "{separator}",
        separator = "╔════════════════════════════════════════════════════════╗".bold()
    );
    println!(
        "{title}",
        title = "║          LibreMesh Hardware Test Suite v0.1.0         ║"
            .bold()
            .cyan()
    );
    println!(
        "{separator}",
        separator = "╚════════════════════════════════════════════════════════╝".bold()
    );
    println!();

    // Resolve which target descriptor to run against
    let harness_config = HarnessConfig {
        env_override: args.env.clone(),
        place: args.place.clone(),
        repo_root: args.repo_root.clone(),
        firmware: args.firmware.clone(),
    };

    let target_path = match topology::resolve_target(&harness_config) {
        Resolution::Overridden(path) => PathBuf::from(path),
        Resolution::Resolved(path) => {
            eprintln!(
                "{arrow} Resolved place {place} to {path}",
                arrow = "→".green(),
                place = args.place.as_deref().unwrap_or("?").bold(),
                path = path.display()
            );
            config::export_target(&path);
            path
        }
        other => {
            anyhow::bail!(
                "No target descriptor resolved ({other:?}). Pass --env or a resolvable --place."
            );
        }
    };

    let descriptor = TargetDescriptor::load(&target_path)?;

    // Hand the image table to the session the way the device management
    // layer expects it
    tracing::debug!(
        "Session images: {images:?}",
        images = harness_config.session_images()
    );

    // Transition the board into a usable shell
    eprintln!(
        "{arrow} Connecting to target {host}...",
        arrow = "→".cyan(),
        host = descriptor.ssh.host.bold()
    );

    let mut strategy = BoardStrategy::new(&descriptor);
    if let Err(e) = strategy.transition(DriverState::Shell).await {
        tracing::error!("Failed to transition to state shell: {e:#}");
        eprintln!(
            "{cross} Failed to transition to state shell",
            cross = "✗".red()
        );
        std::process::exit(3);
    }
    let shell = strategy.shell()?.clone();

    eprintln!("{check} Shell ready!", check = "✓".green());

    let bringup = BringUp {
        client_binary: args.client_binary.clone(),
        ..BringUp::default()
    }
    .with_interface_deadline(Duration::from_secs(args.mesh_deadline));

    let target_info = report::TargetInfo {
        host: descriptor.ssh.host.clone(),
        place: args.place.clone(),
        target: target_path.display().to_string(),
        firmware: harness_config.firmware.display().to_string(),
    };

    // Create test runner
    let mut runner = runner::TestRunner::new(shell, bringup, target_info, args.verbose, non_interactive);

    // Run tests
    let report = if let Some(test_list) = args.tests {
        runner.run_specific_tests(test_list).await?
    } else {
        runner.run_all_tests().await?
    };

    // Output results
    match args.format {
        OutputFormat::Human => {
            report.print_summary();
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)?;
            if let Some(output_path) = args.output {
                std::fs::write(output_path, json)?;
            } else {
                println!("{json}");
            }
        }
        OutputFormat::Markdown => {
            let markdown = generate_markdown_report(&report);
            if let Some(output_path) = args.output {
                std::fs::write(output_path, markdown)?;
            } else {
                println!("{markdown}");
            }
        }
    }

    // Exit with appropriate code
    if report.tests_failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn generate_markdown_report(report: &report::TestReport) -> String {
    let mut md = String::new();

    md.push_str("# LibreMesh Hardware Test Report\n\n");
    md.push_str(&format!("**Test ID:** {id}\n", id = report.test_id));
    md.push_str(&format!(
        "**Date:** {timestamp}\n",
        timestamp = report.timestamp
    ));
    md.push_str(&format!(
        "**Target:** {target}\n",
        target = report.target_info.target
    ));
    md.push_str(&format!(
        "**Firmware:** {firmware}\n\n",
        firmware = report.target_info.firmware
    ));

    md.push_str("## Summary\n\n");
    md.push_str(&format!(
        "- **Total Tests:** {total}\n",
        total = report.tests_run
    ));
    md.push_str(&format!(
        "- **Passed:** {passed} ({percentage:.1}%)\n",
        passed = report.tests_passed,
        percentage = report.tests_passed as f64 / report.tests_run.max(1) as f64 * 100.0
    ));
    md.push_str(&format!(
        "- **Failed:** {failed} ({percentage:.1}%)\n",
        failed = report.tests_failed,
        percentage = report.tests_failed as f64 / report.tests_run.max(1) as f64 * 100.0
    ));
    md.push('\n');

    md.push_str("## Test Results\n\n");
    md.push_str("| Category | Test | Result | Duration | Details |\n");
    md.push_str("|----------|------|--------|----------|----------|\n");

    for result in &report.test_results {
        let status = if result.passed {
            "✅ Pass"
        } else {
            "❌ Fail"
        };
        let details = if let Some(err) = &result.error {
            err.clone()
        } else {
            "OK".to_string()
        };

        md.push_str(&format!(
            "| {category} | {name} | {status} | {duration}ms | {details} |\n",
            category = result.category,
            name = result.name,
            status = status,
            duration = result.duration_ms,
            details = details
        ));
    }

    md.push_str("\n## Recommendations\n\n");
    for rec in &report.recommendations {
        md.push_str(&format!("- {rec}\n"));
    }

    md
}

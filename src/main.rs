//! devbox CLI
//!
//! Provisions a development workspace inside a fresh Ubuntu image: system
//! packages, Poetry, project dependencies, and the prompt color switch.
//!
//! # Usage
//!
//! ```bash
//! # Check prerequisites (tools, network, disk)
//! devbox preflight
//!
//! # Show the steps that will run
//! devbox plan
//!
//! # Provision the image
//! devbox provision
//!
//! # Verify the result
//! devbox status
//!
//! # Print the equivalent Dockerfile
//! devbox render
//! ```
//!
//! In a container build:
//!
//! ```dockerfile
//! FROM ubuntu:22.04
//! COPY devbox /usr/local/bin/devbox
//! RUN devbox provision --preflight
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use devbox::plan::build_plan;
use devbox::preflight::{CheckResult, PreflightChecker};
use devbox::process::HostRunner;
use devbox::stamp::Stamp;
use devbox::{render, verify, ProvisionConfig};

#[derive(Parser)]
#[command(name = "devbox")]
#[command(author, version, about = "Development workspace provisioner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply every provisioning step in order
    Provision {
        /// Run even if the image was already provisioned
        #[arg(long)]
        force: bool,

        /// Run preflight checks first and abort if any fail
        #[arg(long)]
        preflight: bool,
    },

    /// Show the ordered steps without running them
    Plan,

    /// Check host tools, network, and disk space
    Preflight,

    /// Verify a provisioned image
    Status,

    /// Print the plan as a Dockerfile
    Render {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = ProvisionConfig::from_env();

    let result = match cli.command {
        Commands::Provision { force, preflight } => cmd_provision(&config, force, preflight),
        Commands::Plan => cmd_plan(&config),
        Commands::Preflight => cmd_preflight(&config),
        Commands::Status => cmd_status(&config),
        Commands::Render { output } => cmd_render(&config, output),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "devbox=debug" } else { "devbox=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_provision(config: &ProvisionConfig, force: bool, preflight: bool) -> Result<()> {
    if preflight {
        let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
        let report = runtime.block_on(PreflightChecker::new(config.clone()).run_all());
        report.print_summary();
        if !report.is_ok() {
            bail!("preflight checks failed");
        }
        println!();
    }

    let start = Instant::now();
    let Some(_report) = devbox::provision(config, &HostRunner, force)? else {
        return Ok(());
    };

    let total = start.elapsed().as_secs_f64();
    if total >= 60.0 {
        println!("\n=== Provisioning Complete ({:.1}m) ===", total / 60.0);
    } else {
        println!("\n=== Provisioning Complete ({:.1}s) ===", total);
    }
    println!("  Workdir: {}", config.workdir.display());
    println!("  Profile: {}", config.profile_path().display());
    println!("\nNext: devbox status");

    Ok(())
}

fn cmd_plan(config: &ProvisionConfig) -> Result<()> {
    let plan = build_plan(config);

    println!("devbox plan ({})", config.base_image());
    println!("======================");
    for (i, step) in plan.iter().enumerate() {
        let net = if step.needs_network() { " [network]" } else { "" };
        println!("  {}. {:<30} {}{}", i + 1, step.label(), step, net);
    }
    println!();
    println!("Root:    {}", config.root.display());
    println!("Profile: {}", config.profile_path().display());
    println!("Stamp:   {}", config.stamp_path().display());

    Ok(())
}

fn cmd_preflight(config: &ProvisionConfig) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    let report = runtime.block_on(PreflightChecker::new(config.clone()).run_all());
    report.print_summary();

    if !report.is_ok() {
        bail!("{} preflight check(s) failed", report.errors().len());
    }
    Ok(())
}

fn cmd_status(config: &ProvisionConfig) -> Result<()> {
    println!("devbox Status");
    println!("=============");
    println!();
    println!("Configuration:");
    println!("  Base image:  {}", config.base_image());
    println!("  Packages:    {}", config.packages.join(" "));
    println!("  Workdir:     {}", config.workdir.display());
    println!("  Tool:        {} ({})", config.tool, config.tool_bin_dir.display());
    println!("  Environment: {}={}", config.env_name, config.env_value);
    println!();

    let checks = verify::verify(config, &HostRunner);
    println!("Checks:");
    for check in &checks {
        check.print();
    }
    println!();

    let failed: Vec<&CheckResult> = checks.iter().filter(|c| !c.passed).collect();
    if failed.is_empty() {
        println!("Workspace ready.");
        return Ok(());
    }

    println!("Next steps:");
    match Stamp::read(&config.stamp_path()) {
        Ok(None) => println!("  1. Run 'devbox provision' to provision the image"),
        _ => println!("  1. Rebuild from {} and run 'devbox provision'", config.base_image()),
    }
    bail!("{} of {} checks failed", failed.len(), checks.len());
}

fn cmd_render(config: &ProvisionConfig, output: Option<PathBuf>) -> Result<()> {
    let dockerfile = render::dockerfile(config);

    match output {
        Some(path) => {
            std::fs::write(&path, &dockerfile)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => print!("{}", dockerfile),
    }
    Ok(())
}

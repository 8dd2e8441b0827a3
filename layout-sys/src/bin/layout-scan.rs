// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use layout_core::{CoreConfig, Partition, Reconciler, ScanOutcome};
use layout_sys::{ToolConfig, linux_backends, probe_capabilities};
use layout_types::bytes_to_pretty;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(name = "layout-scan")]
#[command(about = "Scan a block device and print its reconciled partition tree")]
struct Args {
    /// Device node, e.g. /dev/sda
    #[arg(long)]
    device: String,

    /// Core configuration (alignment, capabilities)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tool wrapper configuration
    #[arg(long)]
    tools: Option<PathBuf>,

    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("layout_core=info,layout_sys=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => CoreConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => CoreConfig::default(),
    };
    if config.capabilities.known_types().next().is_none() {
        config.capabilities = probe_capabilities();
    }

    let tools = match &args.tools {
        Some(path) => ToolConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ToolConfig::default(),
    };

    let backends = linux_backends(tools);
    let outcome = Reconciler::new(&backends, &config)
        .scan_device(&args.device)
        .with_context(|| format!("scanning {}", args.device))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_text(&outcome);
    }
    Ok(())
}

fn print_text(outcome: &ScanOutcome) {
    let device = &outcome.device;
    println!(
        "{} {} ({})",
        device.path(),
        device.info.model,
        bytes_to_pretty(&device.info.capacity(), true)
    );

    let Some(table) = &device.table else {
        println!("  no partition table");
        return;
    };
    println!(
        "  {} table, usable sectors {}..={}",
        table.table_type.as_str(),
        table.first_usable,
        table.last_usable
    );
    for partition in table.partitions() {
        print_partition(partition, device.sector_size());
    }

    for warning in &outcome.warnings {
        println!("warning: {warning}");
    }
    for diagnostic in &outcome.diagnostics {
        println!("note: {diagnostic}");
    }
}

fn print_partition(partition: &Partition, sector_size: u64) {
    let indent = if partition.is_logical() { "    " } else { "  " };
    let number = partition
        .number
        .map(|n| format!("#{n}"))
        .unwrap_or_else(|| "-".to_string());
    let fs = partition.file_system.effective();

    let mut line = format!(
        "{indent}{number:>4} {:>12} {:>12}  {}",
        partition.first_sector,
        partition.last_sector,
        partition.describe(sector_size)
    );
    if let Some(label) = &fs.label {
        line.push_str(&format!(" label={label}"));
    }
    if let Some(mount_point) = &partition.mount.mount_point {
        line.push_str(&format!(" on {mount_point}"));
    }
    if partition.misaligned {
        line.push_str(" [misaligned]");
    }
    println!("{line}");
}

use anyhow::Context;
use axum::{response::IntoResponse, routing::get, Router};
use clap::Parser;
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

use memtopo::report::{format_cpu_list, group_identical};
use memtopo::{CpuTopology, ProbeConfig, TopologyMetricExporter, TopologyReport};

#[derive(Parser, Debug)]
#[command(name = "memtopo")]
#[command(about = "Cache and TLB topology detection for x86 CPUs")]
struct Args {
    #[arg(
        long = "cpu",
        help = "CPUs to probe (can be specified multiple times, supports ranges and comma-separated lists: --cpu 0-3,5 or --cpu 0 --cpu 1)",
        action = clap::ArgAction::Append
    )]
    cpus: Vec<String>,

    #[arg(long, help = "Probe every online CPU")]
    all_cpus: bool,

    #[arg(long, help = "Print the detected topology as JSON")]
    json: bool,

    #[arg(
        long,
        help = "Validate the detected topology and exit non-zero on inconsistencies"
    )]
    check: bool,

    #[arg(long, help = "Serve the detected topology as Prometheus metrics")]
    serve: bool,

    #[arg(
        long,
        default_value = "0.0.0.0:8080",
        help = "Listen address for --serve"
    )]
    listen: SocketAddr,

    #[arg(short, long, help = "Enable verbose logging (shows every CPUID query)")]
    verbose: bool,
}

struct AppState {
    exporter: TopologyMetricExporter,
}

async fn metrics_handler(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    memtopo::gather_metrics!(buffer, encoder, state.exporter, "topology");

    let content_type = encoder.format_type().to_string();
    (
        [("Content-Type", content_type)],
        String::from_utf8(buffer).unwrap_or_default(),
    )
}

fn probe(config: &ProbeConfig) -> memtopo::Result<Vec<CpuTopology>> {
    if config.cpus.is_empty() {
        Ok(vec![memtopo::detect()?])
    } else {
        config
            .cpus
            .iter()
            .map(|&cpu| memtopo::detect_on_cpu(cpu))
            .collect()
    }
}

fn print_text(topologies: &[CpuTopology]) {
    for (i, (cpus, topology)) in group_identical(topologies).iter().enumerate() {
        if i > 0 {
            println!();
        }
        if cpus.is_empty() {
            println!("{topology}");
        } else {
            println!("CPU {}: {topology}", format_cpu_list(cpus));
        }
    }
}

/// Validate every topology; returns whether all of them passed
fn run_checks(topologies: &[CpuTopology]) -> bool {
    let mut all_passed = true;
    for topology in topologies {
        let target = topology
            .cpu
            .map_or_else(|| "current CPU".to_string(), |c| format!("CPU {c}"));
        let report = memtopo::topology::check(topology);
        if report.passed() {
            println!("{target}: topology OK");
        } else {
            all_passed = false;
            for failure in report.failures() {
                println!("{target}: FAIL: {failure}");
            }
        }
    }
    all_passed
}

async fn serve(addr: SocketAddr, topologies: &[CpuTopology]) -> anyhow::Result<()> {
    let exporter =
        TopologyMetricExporter::new(topologies).context("failed to register topology metrics")?;
    let app_state = Arc::new(AppState { exporter });

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(app_state);

    tracing::warn!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete, exiting");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::warn!("Shutdown triggered by Ctrl+C");
        },
        _ = terminate => {
            tracing::warn!("Shutdown triggered by SIGTERM");
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup logging based on verbose flag
    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt().with_max_level(log_level).init();

    let processor = &*memtopo::common::LOCAL_PROCESSOR;
    tracing::info!("Detected CPU vendor: {}", processor.vendor.name());
    if let Some(sig) = processor.signature {
        tracing::info!(
            "Signature: family {:#x} model {:#x} stepping {:#x}",
            sig.display_family(),
            sig.display_model(),
            sig.stepping
        );
    }

    // Build configuration from CLI arguments
    let config = if args.all_cpus {
        ProbeConfig::all_online()
    } else if !args.cpus.is_empty() {
        ProbeConfig::new(ProbeConfig::parse_cpu_list(&args.cpus.join(","))?)
    } else {
        ProbeConfig::current()
    };

    let topologies = probe(&config).context("topology detection failed")?;

    if args.check {
        if !run_checks(&topologies) {
            std::process::exit(1);
        }
        return Ok(());
    }

    if args.json {
        let reports: Vec<TopologyReport> = topologies.iter().map(TopologyReport::from).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("failed to encode JSON report")?
        );
    } else {
        print_text(&topologies);
    }

    if args.serve {
        serve(args.listen, &topologies).await?;
    }

    Ok(())
}

//! Reference TNCS binary (spec §10): wires plugin loading, the in-process
//! sample IMV, and the batch engine to stdin/stdout for manual exercising.
//! Not a network transport — the caller is responsible for getting bytes to
//! and from the real peer.

use std::io::{self, Read, Write};

use clap::Parser;
use tnc_types::RecommendationPolicy;
use tncs::TncServer;

#[derive(Parser, Debug)]
#[command(name = "tncs", about = "TNCS reference server: one connection, stdin/stdout batches")]
struct Cli {
    /// Plugin config file in the `IMV "<name>" <path>` format (spec §4.2).
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Policy DSL source file to load as the in-process sample IMV.
    /// Falls back to `TNC_POLICY_PATH` when absent.
    #[arg(long)]
    policy: Option<std::path::PathBuf>,

    /// Require every voting IMV to recommend access rather than any one of
    /// them (spec §4.5's ALL vs ANY aggregation policy).
    #[arg(long)]
    require_all: bool,
}

fn main() -> anyhow::Result<()> {
    tnc_telemetry::init_logging();
    let cli = Cli::parse();

    let policy = if cli.require_all { RecommendationPolicy::All } else { RecommendationPolicy::Any };
    let mut server = TncServer::new(policy);

    let policy_path = cli.policy.or_else(|| std::env::var("TNC_POLICY_PATH").ok().map(Into::into));
    if let Some(path) = &policy_path {
        let source = std::fs::read_to_string(path)?;
        server.install_sample_imv(&source)?;
    }
    if let Some(path) = &cli.config {
        let loaded = server.load_config(path);
        if loaded < 0 {
            anyhow::bail!("failed to read config file {}", path.display());
        }
        tracing::info!(loaded, "IMV plugins loaded from config");
    }

    let conn_id = server.accept_connection();

    let mut incoming = String::new();
    io::stdin().read_to_string(&mut incoming)?;
    if incoming.trim().is_empty() {
        return Ok(());
    }

    match server.receive_batch(conn_id, incoming.as_bytes()) {
        Ok(Some(reply)) => {
            println!("{reply}");
            io::stdout().flush()?;
        }
        Ok(None) => {
            tracing::info!("handshake concluded with no reply to send");
        }
        Err(e) => {
            tracing::error!("receive_batch failed: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

//! Reference TNCC binary (spec §10): wires plugin loading and the batch
//! engine to stdin/stdout for manual exercising. Not a network transport —
//! the caller is responsible for getting bytes to and from the real peer.

use std::io::{self, Read, Write};

use clap::Parser;
use tncc::TncClient;

#[derive(Parser, Debug)]
#[command(name = "tncc", about = "TNCC reference client: one connection, stdin/stdout batches")]
struct Cli {
    /// Plugin config file in the `IMC "<name>" <path>` format (spec §4.2).
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Install the in-process sample IMC alongside any configured plugins.
    #[arg(long)]
    sample: bool,
}

fn main() -> anyhow::Result<()> {
    tnc_telemetry::init_logging();
    let cli = Cli::parse();

    let mut client = TncClient::new();
    if cli.sample {
        client.install_sample_imc();
    }
    if let Some(path) = &cli.config {
        let loaded = client.load_config(path);
        if loaded < 0 {
            anyhow::bail!("failed to read config file {}", path.display());
        }
        tracing::info!(loaded, "IMC plugins loaded from config");
    }

    let (conn_id, first_batch) = client.begin_session();
    println!("{first_batch}");
    io::stdout().flush()?;

    let mut incoming = String::new();
    io::stdin().read_to_string(&mut incoming)?;
    if incoming.trim().is_empty() {
        return Ok(());
    }

    match client.receive_batch(conn_id, incoming.as_bytes()) {
        Ok(Some(reply)) => {
            println!("{reply}");
            io::stdout().flush()?;
        }
        Ok(None) => {
            tracing::info!("handshake concluded, access decision delivered to IMCs");
        }
        Err(e) => {
            tracing::error!("receive_batch failed: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

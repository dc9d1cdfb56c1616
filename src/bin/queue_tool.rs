use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use veriscan::{OfflineQueue, VeriscanConfig};

/// Inspect and operate on the veriscan offline queue.
#[derive(Parser, Debug)]
#[command(name = "queuetool")]
#[command(about = "Inspect and clear the veriscan offline upload queue")]
struct Args {
    /// Path to configuration file (for the queue location)
    #[arg(short, long, default_value = "veriscan.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List pending queue records
    List,
    /// Remove every record and spooled image
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = VeriscanConfig::load_from_file(&args.config)?;
    let queue = OfflineQueue::new(&config.queue).await?;

    match args.command {
        Command::List => list(&queue).await,
        Command::Clear => clear(&queue).await,
    }
}

async fn list(queue: &OfflineQueue) -> Result<()> {
    let records = queue.read_all().await;
    if records.is_empty() {
        println!("Offline queue is empty");
        return Ok(());
    }

    println!(
        "{} pending record(s) in {}",
        records.len(),
        queue.dir().display()
    );
    println!();
    println!(
        "{:<38} {:<12} {:>9} {:>11} {}",
        "ID", "DOC TYPE", "SIZE", "BYTES", "CREATED"
    );

    for record in &records {
        let bytes = tokio::fs::metadata(&record.image_ref)
            .await
            .map(|m| m.len().to_string())
            .unwrap_or_else(|_| "missing".to_string());

        println!(
            "{:<38} {:<12} {:>4}x{:<4} {:>11} {}",
            record.id,
            record.doc_type,
            record.width,
            record.height,
            bytes,
            format_timestamp(record.created_at),
        );
    }

    Ok(())
}

async fn clear(queue: &OfflineQueue) -> Result<()> {
    let count = queue.read_all().await.len();
    queue.clear().await?;
    println!("Cleared {} record(s)", count);
    Ok(())
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

//! Two-antenna portal example
//!
//! Streams deduplicated tag crossings until Ctrl-C. Entry and exit antennas
//! can be changed with `UR4_ENTRY` / `UR4_EXIT`.

use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use ur4rfid::{DedupConfig, InventoryProcessor, Reader};

fn antenna_from_env(name: &str, default: u8) -> anyhow::Result<u8> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{} must be an antenna number, got {:?}", name, value)),
        Err(_) => Ok(default),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("UR4_PORT").unwrap_or_else(|_| "/dev/ttyUSB0".to_string());
    let entry = antenna_from_env("UR4_ENTRY", 1)?;
    let exit = antenna_from_env("UR4_EXIT", 2)?;

    let reader = Reader::open(&port);
    reader
        .connect()
        .await
        .with_context(|| format!("failed to open {}", port))?;

    println!("Reader {} on {}", reader.get_identity().await?, port);

    reader.set_active_antennas(&[entry, exit], false).await?;
    reader.start_inventory().await?;

    let config = DedupConfig::default()
        .with_window(Duration::from_secs(30))
        .with_portal(entry, exit);
    let (processor, mut events, reporter) = InventoryProcessor::new(reader.clone(), config, 256);

    let processor = tokio::spawn(processor.run_until(async {
        let _ = tokio::signal::ctrl_c().await;
    }));

    while let Some(crossing) = events.recv().await {
        let direction = if crossing.antenna == entry { "entry" } else { "exit" };
        println!("{} [{}]", crossing, direction);

        // A real portal would forward the crossing here and report the result
        reporter.report(crossing.epc, true);
    }

    let stats = processor.await??;
    println!(
        "{} tags, {} events ({} entry / {} exit), {} duplicates avoided",
        stats.unique_tags, stats.emitted, stats.entry_events, stats.exit_events, stats.duplicates_avoided
    );

    reader.disconnect().await?;
    Ok(())
}

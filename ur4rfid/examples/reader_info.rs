//! Reader information example

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use ur4rfid::Reader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (RUST_LOG=ur4rfid=trace shows wire bytes)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Change to your reader's port
    let port = std::env::var("UR4_PORT").unwrap_or_else(|_| "/dev/ttyUSB0".to_string());

    println!("Connecting to {}...", port);

    let reader = Reader::open(&port);
    reader
        .connect()
        .await
        .with_context(|| format!("failed to open {}", port))?;
    println!("✓ Connected!");

    let info = reader.get_reader_info().await?;
    println!("✓ {}", info);

    for (antenna, power) in &info.antenna_powers {
        println!("  antenna {}: {}", antenna, power);
    }

    reader.disconnect().await?;
    println!("✓ Disconnected");

    Ok(())
}

//! malscan - scan a file with every installed antivirus engine at once.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    malscan_cli::run().await
}

//! IMG.LY Background Compositing CLI Tool
//!
//! Command-line interface for compositing images over transparent, color or
//! image backgrounds with optional remote background removal.

#[cfg(feature = "cli")]
use imgly_bgcompose::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}

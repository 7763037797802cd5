mod aggregate;
mod config;
mod error;
mod normalize;
mod state;
mod transport;
mod upload;

use state::Dashboard;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use upload::UploadedFile;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter("info")
        .init();

    let cfg = config::Config::load("dashboard.toml")?;
    let dashboard = Dashboard::new(cfg.upload)?;

    dashboard.subscribe(|st| {
        debug!(phase = ?st.phase, progress = st.progress, "State change");
    });

    let mut files = Vec::new();
    for arg in std::env::args().skip(1) {
        let path = PathBuf::from(&arg);
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(arg.as_str())
            .to_string();
        // Unknown extensions still go through the gate so the rejection
        // names the file.
        let mime = upload::mime_for_path(&path).unwrap_or("application/octet-stream");
        let data = fs::read(&path)?;
        info!(file = %name, mime = %mime, bytes = data.len(), "Selected");
        files.push(UploadedFile::new(name, mime, data));
    }

    dashboard.upload(files).await?;

    let st = dashboard.state();
    if let Some(warnings) = &st.warnings {
        warn!(errors = %warnings, "Some files failed extraction");
    }
    for name in &st.records.processed_file_names {
        info!(file = %name, "Processed");
    }
    info!(
        invoices = st.stats.invoice_count,
        products = st.stats.unique_product_count,
        customers = st.stats.unique_customer_count,
        total_revenue = st.stats.total_revenue,
        average_transaction = st.stats.average_transaction_value,
        "Extraction summary"
    );

    Ok(())
}

//! Org Tree Entry Point
//!
//! Loads the first page of departments and prints the outline.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

use org_tree::api::{ApiService, HttpBackend};
use org_tree::notify::{Notifier, Snackbar};
use org_tree::store::TreeStore;
use org_tree::tree::render_outline;
use org_tree::TreeConfig;

#[derive(Parser, Debug)]
#[command(name = "org-tree", about = "Browse the department hierarchy")]
struct Cli {
    /// JSON config file; ORG_TREE_* environment variables are used otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only show roots whose label contains this text
    #[arg(long, default_value = "")]
    label: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TreeConfig::from_file(path),
        None => TreeConfig::from_env(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = rolling_logger::init_logger(&config.log_dir, "OrgTree") {
        eprintln!("Logging disabled: {}", e);
    }
    info!("[MAIN] Using {} at {}", config.endpoint.path(), config.api_base_url);

    let service = match ApiService::new(&config.api_base_url, config.request_timeout()) {
        Ok(service) => service,
        Err(e) => {
            error!("[MAIN] {}", e);
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let snackbar = Arc::new(Snackbar::new(config.notification_timeout()));
    let notifier: Arc<dyn Notifier> = snackbar.clone();
    let store = TreeStore::new(Arc::new(HttpBackend::new(service)), notifier, &config);

    if store.fetch_roots(1, &cli.label, config.endpoint).await.is_err() {
        if let Some(shown) = snackbar.current() {
            eprintln!("{}", shown.message);
        }
        std::process::exit(1);
    }

    let snapshot = store.snapshot().await;
    if snapshot.is_empty() {
        println!("(no departments)");
    } else {
        println!("{}", render_outline(&snapshot));
    }
    println!("Page {} of {}", store.current_page().await, store.total_pages());
}

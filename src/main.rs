//! GD Notes - Main Entry Point
//!
//! Headless bootstrap: loads the document, runs the launch sequence against
//! an in-memory window system, and reports what would be shown.

use gd_notes::config::load_config;
use gd_notes::orchestrator::Orchestrator;
use gd_notes::store::DurableStore;
use gd_notes::window::HeadlessWindows;
use log::{error, info};
use std::process::ExitCode;

/// Application name constant.
const APP_NAME: &str = "GD Notes";

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting {}", APP_NAME);

    let config = load_config();
    info!("Data directory: {}", config.data_dir.display());

    let store = DurableStore::open(config.document_path());
    let windows = HeadlessWindows::new();
    let mut orchestrator = Orchestrator::new(store, windows.clone());

    let opened = match orchestrator.startup() {
        Ok(opened) => opened,
        Err(e) => {
            error!("Startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(
        "Showing tab '{}' ({:?}, {} note(s)) in {}",
        opened.tab.name,
        opened.tab.layout,
        opened.tab.notes.len(),
        opened.window
    );

    let handle = match orchestrator.spawn() {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start orchestrator: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match handle.client().all_tabs() {
        Ok(tabs) => {
            for tab in &tabs {
                info!(
                    "  {} '{}' [{:?}]",
                    tab.id, tab.name, tab.window.state
                );
            }
            info!("{} tab(s), {} window(s) open", tabs.len(), windows.live().len());
        }
        Err(e) => error!("Failed to list tabs: {}", e),
    }

    handle.shutdown();
    ExitCode::SUCCESS
}

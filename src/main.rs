mod app;
mod columns;
mod config;
mod domain;
mod feed;
mod filter;
mod fixture;
mod gitlab;
mod range;
mod source;
mod table;

use std::env;

use app::{APP_NAME, DashboardApp};
use eframe::NativeOptions;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> eframe::Result<()> {
    init_tracing();

    let (settings, warning) = config::load_settings();
    tracing::info!(source = ?settings.source, "starting {APP_NAME}");

    let options = NativeOptions::default();
    eframe::run_native(
        APP_NAME,
        options,
        Box::new(move |cc| Ok(Box::new(DashboardApp::new(cc, &settings, warning)))),
    )
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ISSUE_DASHBOARD_LOG")
        .unwrap_or_else(|_| EnvFilter::new("issue_dashboard=info,warn"));

    let format = env::var("ISSUE_DASHBOARD_LOG_FORMAT").unwrap_or_default();
    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => registry.with(fmt::layer().json().with_ansi(false)).init(),
        _ => registry.with(fmt::layer().compact()).init(),
    }
}

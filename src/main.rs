mod app;
mod commands;
mod config;
mod desktop;
mod error;
mod logging;
mod media;
mod playback;
mod session;
mod timecode;
mod ui;

#[tokio::main]
async fn main() {
    if let Err(e) = app::run().await {
        tracing::error!("{:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

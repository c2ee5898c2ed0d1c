//! Keeps an overlay scene in sync with the bot and logs what it holds.
//!
//! Run with tracing enabled:
//! ```sh
//! CLR_OVERLAY_WS_HOST=wss://forsen.tv/clrsocket RUST_LOG=info,clr_overlay_client=debug \
//!     cargo run --example overlay --features tracing
//! ```

use std::time::Duration;

use clr_overlay_client::overlay::{Client, Scene};
use clr_overlay_client::ws::config::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = Client::from_env(Config::default())?;
    let scene = Scene::default();
    info!(endpoint = client.endpoint(), "Starting overlay");

    let observed = scene.clone();
    let state = client.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(5));
        loop {
            ticker.tick().await;
            for sound in observed.take_sounds() {
                info!(link = %sound.link, gain = sound.gain, "Would play sound");
            }
            info!(
                state = ?state.connection_state(),
                sprites = observed.sprites().len(),
                notifications = observed.notifications().len(),
                combo = ?observed.combo().map(|combo| combo.count),
                win_percent = %observed.win_percent().text,
                reloads = observed.reloads(),
                "Scene"
            );
        }
    });

    let stopper = client.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(120)).await;
        stopper.stop();
    });

    let scene = client.run(scene).await?;
    info!(reloads = scene.reloads(), "Overlay stopped");

    Ok(())
}

//! Submits a clip to the sniper queue and, with an admin session, approves it.
//!
//! ```sh
//! CLR_API_HOST=https://forsen.tv CLR_SESSION=... RUST_LOG=debug \
//!     cargo run --example sniper --features tracing -- forsen https://clips.twitch.tv/SomeClip
//! ```

use clr_overlay_client::sniper::Client;
use clr_overlay_client::sniper::types::Submission;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(username), Some(link)) = (args.next(), args.next()) else {
        anyhow::bail!("usage: sniper <username> <clip link>");
    };

    let mut client = Client::from_env()?;
    let session = std::env::var("CLR_SESSION").ok();
    if let Some(session) = session.clone() {
        client = client.with_session(session);
    }

    let submission = Submission::builder().link(link).build();
    match client.submit(&username, &submission).await {
        Ok(ack) => info!(message = %ack.message, "Submitted"),
        Err(e) => error!("Submission failed: {e}"),
    }

    if session.is_some() {
        let ack = client.approve_submission(&username, &submission).await?;
        info!(message = %ack.message, "Approved");
    }

    Ok(())
}

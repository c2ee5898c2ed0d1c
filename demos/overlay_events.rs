//! Prints the first events received from the overlay socket.
//!
//! ```sh
//! cargo run --example overlay_events -- wss://forsen.tv/clrsocket
//! ```

use std::time::Duration;

use clr_overlay_client::overlay::Client;
use clr_overlay_client::ws::config::Config;
use futures::StreamExt as _;
use tokio::time::timeout;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:2356/clrsocket".to_owned());

    let client = Client::new(&endpoint, Config::default())?;
    let mut events = Box::pin(client.events());
    client.start()?;

    let mut count = 0;
    while let Ok(Some(event)) = timeout(Duration::from_secs(60), events.next()).await {
        match event {
            Ok(event) => println!("{event:?}"),
            Err(e) => eprintln!("{e}"),
        }

        count += 1;
        if count == 20 {
            break;
        }
    }

    client.stop();
    Ok(())
}

//! Diagnostic client: connect to a controller, let the automatic refresh
//! fire, and print every lifecycle and state event as it arrives.
//!
//! ```text
//! probe lights.local [pin ...]
//! ```

use tokio::sync::mpsc;

use blindlink::connection::{Connection, Endpoint, RetryPolicy};
use blindlink::protocol::Command;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(host) = args.next() else {
        eprintln!("usage: probe <host> [pin ...]");
        std::process::exit(2);
    };
    let pins: Vec<String> = args.collect();

    let (event_tx, mut event_rx) = mpsc::channel(200);
    // Held open so the connection keeps running; the probe never sends
    // beyond the automatic refresh.
    let (_cmd_tx, cmd_rx) = mpsc::channel::<Command>(8);

    let connection = Connection::new(
        Endpoint::new(host, Endpoint::DEFAULT_PORT),
        RetryPolicy::ui(),
        pins,
    );
    tokio::spawn(async move {
        connection.run(event_tx, cmd_rx).await;
    });

    while let Some(event) = event_rx.recv().await {
        println!("{event:?}");
    }
}

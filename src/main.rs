use tokio::sync::mpsc;
use tracing::{error, info, warn};

use blindlink::adapter::{CharacteristicHost, LightAccessory};
use blindlink::config::{Config, DeviceConfig};
use blindlink::connection::{Connection, LinkEvent};
use blindlink::protocol::Command;
use blindlink::sync::Synchronizer;

/// Characteristic surface for headless operation: updates go to the log.
/// A real home-automation host plugs in here instead.
struct LogHost {
    device: String,
    pin: String,
}

impl CharacteristicHost for LogHost {
    fn update_power(&mut self, on: bool) {
        info!("{}/{}: power -> {}", self.device, self.pin, on);
    }

    fn update_brightness(&mut self, level: u8) {
        info!("{}/{}: brightness -> {}", self.device, self.pin, level);
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Starting blindlink bridge (devices={}, retry={}x{}s)",
        config.devices.len(),
        config.retry.attempts,
        config.retry.interval_secs,
    );

    for device in &config.devices {
        info!(
            "  Device: {} at ws://{}:{}/ — pins {:?}",
            device.name, device.host, device.port, device.pins,
        );
    }

    let mut handles = Vec::new();
    for device in &config.devices {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(50);
        let (event_tx, event_rx) = mpsc::channel::<LinkEvent>(200);

        let connection = Connection::new(
            device.endpoint(),
            config.retry.policy(),
            device.pins.clone(),
        );
        handles.push(tokio::spawn(async move {
            connection.run(event_tx, cmd_rx).await;
        }));

        let device = device.clone();
        handles.push(tokio::spawn(async move {
            run_device_adapters(device, cmd_tx, event_rx).await;
        }));
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down");
        }
        _ = async {
            let mut sigterm = tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate()
            ).expect("Failed to register SIGTERM handler");
            sigterm.recv().await;
        } => {
            info!("Received SIGTERM, shutting down");
        }
    }

    for handle in handles {
        handle.abort();
    }
    info!("blindlink bridge stopped");
}

/// One accessory per configured pin, fed from the connection's event
/// stream. Runs until the connection stops emitting events.
async fn run_device_adapters(
    device: DeviceConfig,
    cmd_tx: mpsc::Sender<Command>,
    mut event_rx: mpsc::Receiver<LinkEvent>,
) {
    let mut sync = Synchronizer::new();
    for pin in &device.pins {
        let host = LogHost {
            device: device.name.clone(),
            pin: pin.clone(),
        };
        sync.attach(Box::new(LightAccessory::new(
            pin.clone(),
            host,
            cmd_tx.clone(),
        )));
    }

    while let Some(event) = event_rx.recv().await {
        match event {
            LinkEvent::Connecting => info!("{}: connecting", device.name),
            LinkEvent::Connected => info!("{}: connected", device.name),
            LinkEvent::Disconnected => warn!("{}: disconnected, retrying", device.name),
            LinkEvent::Error(reason) => warn!("{}: {}", device.name, reason),
            LinkEvent::Destroyed => {
                // Terminal: the retry budget is spent. Operator action
                // (or a restart) is required.
                error!(
                    "{}: giving up after repeated connect failures",
                    device.name
                );
            }
            LinkEvent::State(state) => sync.dispatch(&state),
        }
    }
}

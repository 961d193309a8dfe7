//! Application state management

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};
use vidbridge_core::{BridgeContext, Catalogue, InputId, InputInfo, OutputLane};

use crate::config::Config;
use crate::devices;

/// Changes pushed to event stream subscribers
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    InputAdded(InputInfo),
    InputRemoved(InputId),
    Routed { input: InputInfo, output: OutputLane },
    StreamChanged { device: String, on: bool },
    DeviceDetached { device: String, inputs: Vec<InputId> },
}

/// Shared application state
pub struct AppState {
    /// Registry owner for every attached device
    pub context: Arc<BridgeContext>,
    /// Configuration
    pub config: Config,
    /// Event broadcast for WebSocket clients
    pub events: broadcast::Sender<BridgeEvent>,
}

impl AppState {
    /// Load the catalogue and attach the configured devices
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let catalogue = match &config.catalogue.path {
            Some(path) => Catalogue::from_file(path)
                .with_context(|| format!("loading catalogue {}", path.display()))?,
            None => Catalogue::default(),
        };
        info!(rows = catalogue.len(), "Input catalogue ready");

        let context = Arc::new(BridgeContext::new(catalogue));
        let (events, _) = broadcast::channel(100);
        let state = Arc::new(Self {
            context,
            config,
            events,
        });

        let added = devices::attach_all(&state.context, &state.config.devices, &state.config.polling);
        info!(
            devices = state.context.devices()?.len(),
            inputs = added.len(),
            "Devices attached"
        );
        for input in added {
            state.publish(BridgeEvent::InputAdded(input));
        }

        Ok(state)
    }

    /// Subscribe to bridge events
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event: BridgeEvent) {
        if self.events.send(event).is_err() {
            debug!("No event subscribers");
        }
    }
}

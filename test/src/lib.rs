//! End-to-end harness: one hosted store and one remote mirror joined by
//! in-memory channels, pumped synchronously so tests control exactly when
//! messages move.

use std::sync::Arc;

use syncra_client::{ClientConfig, RemoteEntityData};
use syncra_server::{ConnectionId, EntityHost, HostConfig};
use syncra_shared::{component, DefaultEntityData, MessageChannel, MessageReceiver};

pub const CONNECTION: ConnectionId = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub x: i32,
}
component!(Position);

#[derive(Debug, Clone, PartialEq)]
pub struct Speed(pub u32);
component!(Speed);

#[derive(Debug, Clone, PartialEq)]
pub struct Label(pub &'static str);
component!(Label);

pub struct Link {
    pub host: EntityHost,
    pub client: Arc<RemoteEntityData>,
    to_server: Box<dyn MessageReceiver>,
    to_client: Box<dyn MessageReceiver>,
}

impl Link {
    pub fn new(host_config: HostConfig, client_config: ClientConfig) -> Self {
        let (client_sender, to_server) = MessageChannel::unbounded();
        let (server_sender, to_client) = MessageChannel::unbounded();
        let host = EntityHost::new(Arc::new(DefaultEntityData::new()), host_config);
        host.open_session(CONNECTION, server_sender);
        let client = Arc::new(RemoteEntityData::new(client_sender, client_config));
        Self {
            host,
            client,
            to_server,
            to_client,
        }
    }

    pub fn store(&self) -> &Arc<DefaultEntityData> {
        self.host.store()
    }

    /// Forwards queued messages in both directions until quiescent.
    pub fn pump(&mut self) {
        loop {
            let mut idle = true;
            while let Ok(Some(message)) = self.to_server.receive() {
                idle = false;
                let _ = self.host.handle_message(CONNECTION, message);
            }
            while let Ok(Some(message)) = self.to_client.receive() {
                idle = false;
                self.client.handle_message(message);
            }
            if idle {
                return;
            }
        }
    }

    /// One full replication frame: inbound requests, a server send cycle,
    /// and delivery of everything it produced.
    pub fn frame(&mut self) {
        self.pump();
        self.host.send_updates();
        self.pump();
    }
}

impl Default for Link {
    fn default() -> Self {
        Self::new(HostConfig::default(), ClientConfig::default())
    }
}

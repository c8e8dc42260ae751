//! Connection-to-session routing for a hosted store.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use log::warn;

use syncra_shared::{DefaultEntityData, MessageSender, SyncMessage};

use crate::{error::HostError, host_config::HostConfig, hosted_entity_data::HostedEntityData};

pub type ConnectionId = u64;

/// Owns one [`HostedEntityData`] session per connected client over a shared
/// authoritative store. Message handling and the periodic update drive both
/// go through here; a session that loses its transport is closed and dropped
/// without disturbing its peers.
pub struct EntityHost {
    store: Arc<DefaultEntityData>,
    config: HostConfig,
    sessions: Mutex<HashMap<ConnectionId, Arc<HostedEntityData>>>,
}

impl EntityHost {
    pub fn new(store: Arc<DefaultEntityData>, config: HostConfig) -> Self {
        Self {
            store,
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<DefaultEntityData> {
        &self.store
    }

    /// Starts a session for `connection_id`. Reusing a live id closes the
    /// previous session first.
    pub fn open_session(
        &self,
        connection_id: ConnectionId,
        sender: Box<dyn MessageSender>,
    ) -> Arc<HostedEntityData> {
        let session = Arc::new(HostedEntityData::new(
            self.store.clone(),
            sender,
            self.config.clone(),
        ));
        let Ok(mut sessions) = self.sessions.lock() else {
            panic!("session table lock poisoned");
        };
        if let Some(previous) = sessions.insert(connection_id, session.clone()) {
            warn!("connection id {} reused, closing previous session", connection_id);
            previous.close();
        }
        session
    }

    pub fn session(&self, connection_id: ConnectionId) -> Option<Arc<HostedEntityData>> {
        let Ok(sessions) = self.sessions.lock() else {
            panic!("session table lock poisoned");
        };
        sessions.get(&connection_id).cloned()
    }

    /// Returns false if the session was already gone.
    pub fn close_session(&self, connection_id: ConnectionId) -> bool {
        let removed = {
            let Ok(mut sessions) = self.sessions.lock() else {
                panic!("session table lock poisoned");
            };
            sessions.remove(&connection_id)
        };
        match removed {
            Some(session) => {
                session.close();
                true
            }
            None => false,
        }
    }

    pub fn session_count(&self) -> usize {
        let Ok(sessions) = self.sessions.lock() else {
            panic!("session table lock poisoned");
        };
        sessions.len()
    }

    /// Routes one inbound message. A dead outbound transport closes the
    /// session and surfaces the error; messages for unknown connections are
    /// logged and dropped.
    pub fn handle_message(
        &self,
        connection_id: ConnectionId,
        message: SyncMessage,
    ) -> Result<(), HostError> {
        let Some(session) = self.session(connection_id) else {
            warn!(
                "dropping {} for unknown connection {}",
                message.name(),
                connection_id
            );
            return Ok(());
        };
        if let Err(error) = session.handle_message(message) {
            warn!("connection {} transport failed: {}", connection_id, error);
            self.close_session(connection_id);
            return Err(error);
        }
        Ok(())
    }

    /// Drives one send cycle on every session. Sessions whose transport died
    /// are closed and dropped; the rest are unaffected.
    pub fn send_updates(&self) {
        let sessions: Vec<(ConnectionId, Arc<HostedEntityData>)> = {
            let Ok(sessions) = self.sessions.lock() else {
                panic!("session table lock poisoned");
            };
            sessions
                .iter()
                .map(|(id, session)| (*id, session.clone()))
                .collect()
        };
        for (connection_id, session) in sessions {
            if let Err(error) = session.send_updates() {
                warn!("connection {} transport failed: {}", connection_id, error);
                self.close_session(connection_id);
            }
        }
    }
}

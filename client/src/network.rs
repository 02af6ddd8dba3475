use crate::config::SessionParams;
use crate::connection::{Connection, ConnectionEvent};
use crate::error::SessionError;
use crate::roster::Roster;
use crate::session::{Intent, IntentError, SessionSnapshot, SessionStateMachine, Transition};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::ServerMessage;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected(Option<SessionError>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Intent(#[from] IntentError),

    #[error(transparent)]
    Connection(#[from] SessionError),
}

/// One live game session: the connection plus the state machine it feeds.
///
/// The owner calls [`Client::pump`] from its frame loop; every event that
/// arrived since the previous call is applied in order before it returns.
pub struct Client {
    connection: Connection,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    session: SessionStateMachine,
    status: ConnectionStatus,
    last_fault: Option<SessionError>,
    rng: StdRng,
}

impl Client {
    /// Connects to the server described by `params`. Needs a tokio runtime.
    pub fn open(params: &SessionParams) -> Self {
        let (connection, events) = Connection::open(params);
        Self::new(connection, events, params)
    }

    pub fn new(
        connection: Connection,
        events: mpsc::UnboundedReceiver<ConnectionEvent>,
        params: &SessionParams,
    ) -> Self {
        let roster = Roster::new(&params.user_id, &params.participants);
        info!(
            "Session for {} in game {} with {} participants",
            params.user_id,
            params.game_id,
            roster.len()
        );

        Self {
            connection,
            events,
            session: SessionStateMachine::new(params.user_id.clone(), roster),
            status: ConnectionStatus::Connecting,
            last_fault: None,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn session(&self) -> &SessionStateMachine {
        &self.session
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub fn last_fault(&self) -> Option<&SessionError> {
        self.last_fault.as_ref()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<SessionSnapshot>> {
        self.session.subscribe()
    }

    /// Applies every event already received. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Waits for the next event and applies it. `false` once the stream ended.
    pub async fn next_event(&mut self) -> bool {
        match self.events.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    fn handle_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Message(message) => {
                if message == ServerMessage::Authenticated {
                    self.status = ConnectionStatus::Connected;
                }
                let kind = message.kind();
                if let Transition::PhaseChanged { from, to } = self.session.apply(message) {
                    info!("{} moved the session from {} to {}", kind, from, to);
                }
            }
            ConnectionEvent::Fault(fault) => {
                warn!("Connection fault: {}", fault);
                self.last_fault = Some(fault);
            }
            ConnectionEvent::Closed(reason) => {
                match &reason {
                    Some(e) => error!("Session ended: {}", e),
                    None => info!("Session closed"),
                }
                self.status = ConnectionStatus::Disconnected(reason);
            }
        }
    }

    /// Shapes `intent` into a command and hands it to the connection.
    pub fn submit(&mut self, intent: Intent) -> Result<(), SubmitError> {
        if let ConnectionStatus::Disconnected(_) = self.status {
            return Err(SessionError::NotConnected.into());
        }

        let command = self.session.command_for(intent, &mut self.rng)?;
        debug!("Sending {:?}", command);
        self.connection.send(command)?;
        Ok(())
    }

    pub fn close(&mut self) {
        self.connection.close();
    }

    /// Closes the connection and waits for the background task to finish.
    pub async fn shutdown(mut self) {
        self.connection.close();
        self.connection.closed().await;
    }
}

//! Connection manager: owns the duplex connection for one game session.
//!
//! The transport lives inside a background task. Callers talk to it through a
//! [`Connection`] handle (fire-and-forget commands) and an event receiver
//! that yields decoded server messages in exactly the order they arrived.
//!
//! The first frame written is always `Authenticate`. Until the server answers
//! with `Authenticated`, outgoing commands are held back and incoming
//! messages are queued; both queues are released in order once the
//! acknowledgment lands.

use crate::config::SessionParams;
use crate::error::SessionError;
use crate::transport::{Transport, WebSocketTransport};
use log::{debug, error, info, warn};
use shared::{decode_server_message, encode_client_message, ClientMessage, ServerMessage};
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Message(ServerMessage),
    /// A recoverable fault; the session keeps running.
    Fault(SessionError),
    /// Always the last event. `None` means a clean close.
    Closed(Option<SessionError>),
}

pub struct Connection {
    cmd_tx: mpsc::UnboundedSender<ClientMessage>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Connection {
    /// Starts connecting to `params.url` in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(params: &SessionParams) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let url = params.url.clone();
        info!("Connecting to {}", url);

        Self::spawn(
            async move { WebSocketTransport::connect(&url).await },
            authenticate_message(params),
            params.auth_timeout,
        )
    }

    /// Runs the session over an already connected transport.
    pub fn with_transport<T: Transport>(
        transport: T,
        params: &SessionParams,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        Self::spawn(
            async move { Ok(transport) },
            authenticate_message(params),
            params.auth_timeout,
        )
    }

    fn spawn<T, F>(
        connect: F,
        authenticate: ClientMessage,
        auth_timeout: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>)
    where
        T: Transport,
        F: Future<Output = Result<T, SessionError>> + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let transport = tokio::select! {
                result = connect => match result {
                    Ok(transport) => transport,
                    Err(e) => {
                        error!("Failed to connect: {}", e);
                        let _ = event_tx.send(ConnectionEvent::Closed(Some(e)));
                        return;
                    }
                },
                _ = &mut shutdown_rx => {
                    debug!("Connection closed before the transport was ready");
                    let _ = event_tx.send(ConnectionEvent::Closed(None));
                    return;
                }
            };

            connection_loop(
                transport,
                authenticate,
                auth_timeout,
                cmd_rx,
                event_tx,
                shutdown_rx,
            )
            .await;
        });

        let connection = Connection {
            cmd_tx,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        };

        (connection, event_rx)
    }

    /// Queues a command for the server. Does not wait for delivery.
    pub fn send(&self, message: ClientMessage) -> Result<(), SessionError> {
        self.cmd_tx
            .send(message)
            .map_err(|_| SessionError::NotConnected)
    }

    /// Asks the connection loop to close the transport and stop.
    pub fn close(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }

    /// Waits until the background task has exited.
    pub async fn closed(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Connection task failed: {}", e);
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

fn authenticate_message(params: &SessionParams) -> ClientMessage {
    ClientMessage::Authenticate {
        access_token: params.access_token.clone(),
        game_id: params.game_id.clone(),
    }
}

async fn send_message<T: Transport>(
    transport: &mut T,
    message: &ClientMessage,
) -> Result<(), SessionError> {
    let text = encode_client_message(message)
        .map_err(|e| SessionError::Transport(format!("failed to encode command: {}", e)))?;
    transport.send(text).await
}

fn emit(event_tx: &mpsc::UnboundedSender<ConnectionEvent>, event: ConnectionEvent) {
    if event_tx.send(event).is_err() {
        debug!("Event receiver dropped");
    }
}

async fn connection_loop<T: Transport>(
    mut transport: T,
    authenticate: ClientMessage,
    auth_timeout: Duration,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientMessage>,
    event_tx: mpsc::UnboundedSender<ConnectionEvent>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    if let Err(e) = send_message(&mut transport, &authenticate).await {
        error!("Failed to send authentication: {}", e);
        emit(&event_tx, ConnectionEvent::Closed(Some(e)));
        return;
    }
    debug!("Authentication sent, waiting for acknowledgment");

    let mut authenticated = false;
    let mut commands_open = true;
    let mut held_commands: VecDeque<ClientMessage> = VecDeque::new();
    let mut held_messages: Vec<ServerMessage> = Vec::new();

    let auth_deadline = tokio::time::sleep(auth_timeout);
    tokio::pin!(auth_deadline);

    let reason = 'session: loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                debug!("Shutdown requested");
                break 'session None;
            }

            _ = &mut auth_deadline, if !authenticated => {
                warn!("No authentication acknowledgment after {:?}", auth_timeout);
                break 'session Some(SessionError::AuthenticationTimeout);
            }

            command = cmd_rx.recv(), if commands_open => match command {
                Some(message) if authenticated => {
                    if let Err(e) = send_message(&mut transport, &message).await {
                        break 'session Some(e);
                    }
                }
                Some(message) => {
                    debug!("Holding {:?} until authenticated", message);
                    held_commands.push_back(message);
                }
                None => {
                    commands_open = false;
                }
            },

            incoming = transport.recv() => match incoming {
                Some(Ok(payload)) => match decode_server_message(&payload) {
                    Ok(ServerMessage::Authenticated) if !authenticated => {
                        authenticated = true;
                        info!("Authenticated with game server");
                        emit(&event_tx, ConnectionEvent::Message(ServerMessage::Authenticated));

                        for message in held_messages.drain(..) {
                            emit(&event_tx, ConnectionEvent::Message(message));
                        }
                        while let Some(message) = held_commands.pop_front() {
                            if let Err(e) = send_message(&mut transport, &message).await {
                                break 'session Some(e);
                            }
                        }
                    }
                    Ok(message) if !authenticated => {
                        debug!("Holding {} until authenticated", message.kind());
                        held_messages.push(message);
                    }
                    Ok(message) => emit(&event_tx, ConnectionEvent::Message(message)),
                    Err(e) => {
                        warn!("Dropping undecodable frame: {}", e);
                        emit(&event_tx, ConnectionEvent::Fault(SessionError::Decode(e.to_string())));
                    }
                },
                Some(Err(e)) => break 'session Some(e),
                None if authenticated => break 'session None,
                None => break 'session Some(SessionError::AuthenticationRejected),
            },
        }
    };

    if let Err(e) = transport.close().await {
        debug!("Error while closing transport: {}", e);
    }

    match &reason {
        Some(e) => error!("Connection ended: {}", e),
        None => info!("Connection closed"),
    }
    emit(&event_tx, ConnectionEvent::Closed(reason));
}

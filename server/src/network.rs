//! Server network layer handling TCP connections and the tick loop

use crate::authority::{Authority, Outbound};
use crate::client_manager::{ClientManager, OUTGOING_QUEUE_FRAMES};
use crate::config::ServerConfig;
use bytes::Bytes;
use log::{debug, error, info, warn};
use shared::transport::{read_frame, write_frame};
use shared::{CodecError, ConnectionHandle, HeadlessPresentation, Message, TransportEvent};
use std::error::Error;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Ticks between two status lines in the debug log
const STATUS_INTERVAL_TICKS: u64 = 600;

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    Transport(TransportEvent),
    Shutdown,
}

/// Stops a running server from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        if self.server_tx.send(ServerMessage::Shutdown).is_err() {
            debug!("Shutdown requested for a server that already stopped");
        }
    }
}

/// Main server coordinating networking and the movement authority
pub struct Server {
    listener: Arc<TcpListener>,
    clients: Arc<RwLock<ClientManager>>,
    authority: Authority<HeadlessPresentation>,
    config: ServerConfig,
    tick: u64,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,

    tasks: Vec<JoinHandle<()>>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let listener = Arc::new(TcpListener::bind(&config.bind_addr).await?);
        info!("Server listening on {}", listener.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let authority = Authority::new(
            HeadlessPresentation::new(),
            config.step,
            config.skins.clone(),
        );

        Ok(Server {
            listener,
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_clients))),
            authority,
            config,
            tick: 0,
            server_tx,
            server_rx,
            tasks: Vec::new(),
        })
    }

    /// Bound address; useful when the configured port was 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            server_tx: self.server_tx.clone(),
        }
    }

    pub fn authority(&self) -> &Authority<HeadlessPresentation> {
        &self.authority
    }

    /// Spawns task that accepts incoming connections
    fn spawn_acceptor(&mut self) {
        let listener = Arc::clone(&self.listener);
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        self.tasks.push(tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        Self::accept_connection(stream, addr, &clients, &server_tx).await;
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        }));
    }

    /// Registers a connection and starts its reader and writer tasks
    async fn accept_connection(
        stream: TcpStream,
        addr: SocketAddr,
        clients: &RwLock<ClientManager>,
        server_tx: &mpsc::UnboundedSender<ServerMessage>,
    ) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Could not disable Nagle for {}: {}", addr, e);
        }

        let (frame_tx, frame_rx) = mpsc::channel(OUTGOING_QUEUE_FRAMES);
        let identity = {
            let mut clients_guard = clients.write().await;
            clients_guard.add_client(addr, frame_tx)
        };

        let Some(identity) = identity else {
            warn!("Server full, rejecting connection from {}", addr);
            return;
        };

        let (read_half, write_half) = stream.into_split();
        tokio::spawn(Self::write_loop(write_half, frame_rx, identity));

        // Connected must be queued ahead of anything the reader forwards.
        let connected = TransportEvent::Connected {
            identity,
            remote_addr: addr.ip().to_string(),
        };
        if server_tx.send(ServerMessage::Transport(connected)).is_err() {
            error!("Server loop gone, dropping connection {}", identity);
            clients.write().await.remove_client(&identity);
            return;
        }

        let reader = tokio::spawn(Self::read_loop(read_half, identity, server_tx.clone()));
        clients
            .write()
            .await
            .attach_reader(identity, reader.abort_handle());
    }

    async fn read_loop(
        mut read_half: OwnedReadHalf,
        identity: ConnectionHandle,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
    ) {
        loop {
            match read_frame(&mut read_half).await {
                Ok(Some(frame)) => {
                    let event = TransportEvent::MessageReceived {
                        identity,
                        bytes: Bytes::copy_from_slice(&frame),
                    };
                    if server_tx.send(ServerMessage::Transport(event)).is_err() {
                        return;
                    }
                }
                Ok(None) => {
                    debug!("Connection {} closed by peer", identity);
                    break;
                }
                Err(e) => {
                    warn!("Error reading from connection {}: {}", identity, e);
                    break;
                }
            }
        }

        let _ = server_tx.send(ServerMessage::Transport(TransportEvent::Disconnected {
            identity,
        }));
    }

    /// Drains the connection's frame queue until the client manager drops it
    async fn write_loop(
        mut write_half: OwnedWriteHalf,
        mut frame_rx: mpsc::Receiver<Bytes>,
        identity: ConnectionHandle,
    ) {
        while let Some(frame) = frame_rx.recv().await {
            if let Err(e) = write_frame(&mut write_half, &frame).await {
                debug!("Failed to write to connection {}: {}", identity, e);
                break;
            }
        }
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&mut self) {
        let timeout = self.config.idle_timeout;
        if timeout.is_zero() {
            info!("Idle timeout disabled");
            return;
        }

        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        self.tasks.push(tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts(timeout)
                };

                for identity in timed_out {
                    info!("Connection {} timed out", identity);
                    let event = TransportEvent::Disconnected { identity };
                    if server_tx.send(ServerMessage::Transport(event)).is_err() {
                        return;
                    }
                }
            }
        }));
    }

    /// Feeds one transport event through the authority and delivers the result
    async fn handle_event(&mut self, event: TransportEvent) {
        match &event {
            TransportEvent::MessageReceived { identity, .. } => {
                self.clients.write().await.touch(*identity);
            }
            TransportEvent::Disconnected { identity } => {
                self.clients.write().await.remove_client(identity);
            }
            TransportEvent::Connected { .. } => {}
        }

        let outbound = self.authority.handle_event(event);
        self.dispatch(outbound).await;
    }

    /// Queues outbound messages. Connections that overflow their queue are
    /// removed and come back through the event queue as disconnects.
    async fn dispatch(&self, outbound: Vec<Outbound>) {
        if outbound.is_empty() {
            return;
        }

        let mut clients = self.clients.write().await;
        for item in outbound {
            match item {
                Outbound::Send { to, message } => match encode_frame(&message) {
                    Ok(frame) => {
                        if !clients.send_to(to, frame) {
                            debug!("Connection {} gone, dropped {}", to, message.kind());
                        }
                    }
                    Err(e) => error!("Failed to encode {}: {}", message.kind(), e),
                },
                Outbound::Broadcast { message, exclude } => match encode_frame(&message) {
                    Ok(frame) => {
                        let delivered = clients.broadcast(frame, exclude);
                        debug!("Broadcast {} to {} connections", message.kind(), delivered);
                    }
                    Err(e) => error!("Failed to encode {}: {}", message.kind(), e),
                },
            }
        }

        for identity in clients.take_overflowed() {
            let event = TransportEvent::Disconnected { identity };
            if self.server_tx.send(ServerMessage::Transport(event)).is_err() {
                return;
            }
        }
    }

    /// Main server loop coordinating all operations
    ///
    /// Events queued by the network tasks are drained once per tick, in
    /// arrival order. Returns after a shutdown request, with every player
    /// removed from the registry.
    pub async fn run(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.spawn_acceptor();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.config.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started successfully");

        loop {
            tick_interval.tick().await;
            self.tick += 1;

            loop {
                match self.server_rx.try_recv() {
                    Ok(ServerMessage::Transport(event)) => self.handle_event(event).await,
                    Ok(ServerMessage::Shutdown) | Err(TryRecvError::Disconnected) => {
                        info!("Server shutting down");
                        self.authority.shutdown();
                        return Ok(());
                    }
                    Err(TryRecvError::Empty) => break,
                }
            }

            if self.tick % STATUS_INTERVAL_TICKS == 0 {
                let client_count = self.clients.read().await.len();
                if client_count > 0 {
                    debug!(
                        "Tick {}: {} connections, {} players",
                        self.tick,
                        client_count,
                        self.authority.registry().len()
                    );
                }
            }
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn encode_frame(message: &Message) -> Result<Bytes, CodecError> {
    message
        .encode()
        .map(|frame| Bytes::copy_from_slice(&frame))
}

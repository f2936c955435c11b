//! Connection bookkeeping for the TCP transport
//!
//! This module tracks the transport side of every connected client:
//! - Connection handle assignment and server capacity
//! - The bounded outgoing frame queue drained by each connection's writer task
//! - Last activity time for liveness timeouts
//!
//! Player state lives in the authority's registry; the client manager only
//! knows how to reach a connection and whether it is still alive.

use bytes::Bytes;
use log::{debug, info, warn};
use shared::ConnectionHandle;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::AbortHandle;

/// Frames a connection may have queued before it counts as too slow to keep
pub const OUTGOING_QUEUE_FRAMES: usize = 256;

/// Why a frame could not be queued for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The writer is not keeping up with the frames sent to it
    Full,
    /// The writer task has stopped
    Closed,
}

/// A connected client as seen by the transport
#[derive(Debug)]
pub struct Client {
    /// Handle assigned by the server at accept time
    pub id: ConnectionHandle,
    /// Remote address of the TCP peer
    pub addr: SocketAddr,
    /// Last time we received any frame from this client
    pub last_seen: Instant,
    /// Queue feeding the connection's writer task
    sender: mpsc::Sender<Bytes>,
    /// Reader task, stopped when the client is dropped
    reader: Option<AbortHandle>,
}

impl Client {
    pub fn new(
        id: ConnectionHandle,
        addr: SocketAddr,
        sender: mpsc::Sender<Bytes>,
    ) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            sender,
            reader: None,
        }
    }

    /// Queues a frame for the writer task without waiting for room.
    pub fn send(&self, frame: Bytes) -> Result<(), QueueError> {
        self.sender.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => QueueError::Full,
            TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Checks if the client has exceeded the connection timeout
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Manages all live connections
///
/// Handles are assigned sequentially starting from 1 and are never reused
/// during the lifetime of the server. A connection whose queue is full when a
/// frame is sent is removed on the spot and reported by `take_overflowed`.
pub struct ClientManager {
    clients: HashMap<ConnectionHandle, Client>,
    next_client_id: u32,
    max_clients: usize,
    overflowed: Vec<ConnectionHandle>,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            overflowed: Vec::new(),
        }
    }

    /// Attempts to add a new connection
    ///
    /// Returns the assigned handle, or None if the server is at capacity.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        sender: mpsc::Sender<Bytes>,
    ) -> Option<ConnectionHandle> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = ConnectionHandle(self.next_client_id);
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, sender));

        Some(client_id)
    }

    /// Associates the reader task with its connection so removal stops it.
    pub fn attach_reader(&mut self, client_id: ConnectionHandle, reader: AbortHandle) {
        match self.clients.get_mut(&client_id) {
            Some(client) => client.reader = Some(reader),
            None => reader.abort(),
        }
    }

    /// Removes a connection
    ///
    /// Returns true if the client was found and removed, false if it was
    /// already gone. Dropping the client closes its frame queue and stops its
    /// reader.
    pub fn remove_client(&mut self, client_id: &ConnectionHandle) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    /// Marks a connection as alive. Returns false for unknown handles.
    pub fn touch(&mut self, client_id: ConnectionHandle) -> bool {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.last_seen = Instant::now();
            true
        } else {
            false
        }
    }

    /// Queues a frame for one connection. Returns false if it was not queued.
    pub fn send_to(&mut self, client_id: ConnectionHandle, frame: Bytes) -> bool {
        let result = match self.clients.get(&client_id) {
            Some(client) => client.send(frame),
            None => return false,
        };
        match result {
            Ok(()) => true,
            Err(QueueError::Full) => {
                self.drop_overflowed(client_id);
                false
            }
            Err(QueueError::Closed) => false,
        }
    }

    /// Queues a frame for every connection except `exclude`. Returns how many
    /// queues accepted it.
    pub fn broadcast(&mut self, frame: Bytes, exclude: Option<ConnectionHandle>) -> usize {
        let mut delivered = 0;
        let mut full = Vec::new();
        for client in self.clients.values() {
            if Some(client.id) == exclude {
                continue;
            }
            match client.send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(QueueError::Full) => full.push(client.id),
                Err(QueueError::Closed) => {}
            }
        }

        for client_id in full {
            self.drop_overflowed(client_id);
        }
        delivered
    }

    fn drop_overflowed(&mut self, client_id: ConnectionHandle) {
        warn!(
            "Client {} has {} frames queued, dropping it",
            client_id, OUTGOING_QUEUE_FRAMES
        );
        if self.remove_client(&client_id) {
            self.overflowed.push(client_id);
        }
    }

    /// Connections removed for a full queue since the last call
    pub fn take_overflowed(&mut self) -> Vec<ConnectionHandle> {
        std::mem::take(&mut self.overflowed)
    }

    /// Removes connections silent for longer than `timeout`
    ///
    /// Returns the removed handles so the caller can emit disconnect events.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<ConnectionHandle> {
        let timed_out: Vec<ConnectionHandle> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            debug!("Client {} timed out", client_id);
            self.remove_client(client_id);
        }

        timed_out
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

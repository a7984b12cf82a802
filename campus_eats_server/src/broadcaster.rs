//! Role-scoped live-event fan-out.
//!
//! A connection registers once (over SSE) and joins rooms; events are published to rooms and copied into each
//! member connection's channel. Delivery is best-effort and at-most-once: there is no replay, and a connection
//! that has gone away or cannot keep up is pruned on the next publish. Clients are expected to refetch state on
//! reconnect rather than rely on the stream for correctness.
use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
    sync::{Arc, Mutex},
};

use bytes::Bytes;
use log::*;
use serde_json::Value;
use tokio::sync::mpsc;

/// Per-connection buffer. A client this far behind is dropped rather than awaited.
const CONNECTION_BUFFER: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    /// The owning student's private room.
    User(String),
    /// A vendor's kitchen dashboard room.
    Vendor(String),
    /// Watchers of a single order (tracking pages).
    Order(String),
    /// Everyone. Used as the fallback when vendor attribution comes up empty.
    Global,
}

impl Display for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Room::User(id) => write!(f, "user:{id}"),
            Room::Vendor(id) => write!(f, "vendor:{id}"),
            Room::Order(id) => write!(f, "order:{id}"),
            Room::Global => write!(f, "global"),
        }
    }
}

/// Formats a server-sent event frame.
fn sse_frame(event: &str, data: &Value) -> Bytes {
    Bytes::from(format!("event: {event}\ndata: {data}\n\n"))
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    connections: HashMap<u64, mpsc::Sender<Bytes>>,
    rooms: HashMap<Room, HashSet<u64>>,
}

impl Inner {
    fn drop_connection(&mut self, conn_id: u64) {
        self.connections.remove(&conn_id);
        for members in self.rooms.values_mut() {
            members.remove(&conn_id);
        }
        self.rooms.retain(|_, members| !members.is_empty());
    }
}

#[derive(Clone, Default)]
pub struct Broadcaster {
    inner: Arc<Mutex<Inner>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection, joining it to the given rooms. The first frame on the returned channel carries
    /// the connection id, which the client echoes to `/events/subscribe` to join order rooms later.
    pub fn register(&self, rooms: &[Room]) -> (u64, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(CONNECTION_BUFFER);
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner.next_id += 1;
        let conn_id = inner.next_id;
        let hello = sse_frame("connected", &serde_json::json!({ "conn_id": conn_id }));
        // buffer is empty at this point, so the greeting cannot fail
        let _ = tx.try_send(hello);
        inner.connections.insert(conn_id, tx);
        for room in rooms {
            inner.rooms.entry(room.clone()).or_default().insert(conn_id);
        }
        debug!("📡️ Connection {conn_id} registered in rooms [{}]", room_list(rooms));
        (conn_id, rx)
    }

    /// Joins an existing connection to an additional room. Returns `false` if the connection is gone.
    pub fn subscribe(&self, conn_id: u64, room: Room) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        if !inner.connections.contains_key(&conn_id) {
            debug!("📡️ Subscribe to {room} refused: connection {conn_id} is gone");
            return false;
        }
        inner.rooms.entry(room).or_default().insert(conn_id);
        true
    }

    /// Publishes an event to every member of the room. Connections that are closed or too far behind are dropped.
    pub fn publish(&self, room: &Room, event: &str, data: Value) {
        let frame = sse_frame(event, &data);
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let members = match inner.rooms.get(room) {
            Some(members) => members.iter().copied().collect::<Vec<_>>(),
            None => {
                trace!("📡️ No connections in room {room}; {event} dropped");
                return;
            },
        };
        let mut dead = Vec::new();
        for conn_id in members {
            match inner.connections.get(&conn_id) {
                Some(tx) => {
                    if let Err(e) = tx.try_send(frame.clone()) {
                        debug!("📡️ Dropping connection {conn_id}: {e}");
                        dead.push(conn_id);
                    }
                },
                None => dead.push(conn_id),
            }
        }
        for conn_id in dead {
            inner.drop_connection(conn_id);
        }
        trace!("📡️ {event} published to {room}");
    }

    /// Removes a connection outright (stream dropped).
    pub fn disconnect(&self, conn_id: u64) {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner.drop_connection(conn_id);
        debug!("📡️ Connection {conn_id} disconnected");
    }

    pub fn connection_count(&self) -> usize {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).connections.len()
    }
}

fn room_list(rooms: &[Room]) -> String {
    rooms.iter().map(Room::to_string).collect::<Vec<_>>().join(", ")
}

/**
 * Connection Registry
 *
 * The single shared, in-memory table of live connections: user id →
 * connection set, conversation room → connection set. It is an explicit
 * owned object, exposed only through the gateway, never an ambient global.
 *
 * # Concurrency
 *
 * All maps live behind one `tokio::sync::RwLock`, so every mutation is
 * serialized and presence updates cannot be lost to interleaving. Event
 * delivery uses unbounded per-connection channels: pushing an event never
 * blocks, so a slow recipient cannot stall fan-out to others. A connection
 * whose receiver is gone is pruned on the next send that notices it.
 */
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::shared::events::ServerEvent;

/// Opaque identifier for one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Default)]
struct RegistryInner {
    senders: HashMap<ConnectionId, UnboundedSender<ServerEvent>>,
    conn_user: HashMap<ConnectionId, Uuid>,
    by_user: HashMap<Uuid, HashSet<ConnectionId>>,
    rooms: HashMap<Uuid, HashSet<ConnectionId>>,
    conn_rooms: HashMap<ConnectionId, HashSet<Uuid>>,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<RegistryInner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for a user, joined to the given rooms.
    /// Returns the connection id and the receiving end of its event channel.
    pub async fn register(
        &self,
        user_id: Uuid,
        rooms: &[Uuid],
    ) -> (ConnectionId, UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = unbounded_channel();
        let conn = ConnectionId::new();

        let mut inner = self.inner.write().await;
        inner.senders.insert(conn, tx);
        inner.conn_user.insert(conn, user_id);
        inner.by_user.entry(user_id).or_default().insert(conn);
        for room in rooms {
            inner.rooms.entry(*room).or_default().insert(conn);
        }
        inner.conn_rooms.insert(conn, rooms.iter().copied().collect());

        tracing::debug!("connection {} registered for user {}", conn, user_id);
        (conn, rx)
    }

    /// Remove a connection. Returns the owning user and whether this was the
    /// user's last open connection.
    pub async fn unregister(&self, conn: ConnectionId) -> Option<(Uuid, bool)> {
        let mut inner = self.inner.write().await;
        let user_id = inner.conn_user.remove(&conn)?;
        inner.senders.remove(&conn);

        if let Some(rooms) = inner.conn_rooms.remove(&conn) {
            for room in rooms {
                if let Some(members) = inner.rooms.get_mut(&room) {
                    members.remove(&conn);
                    if members.is_empty() {
                        inner.rooms.remove(&room);
                    }
                }
            }
        }

        let remaining = match inner.by_user.get_mut(&user_id) {
            Some(set) => {
                set.remove(&conn);
                set.len()
            }
            None => 0,
        };
        let was_last = remaining == 0;
        if was_last {
            inner.by_user.remove(&user_id);
        }

        tracing::debug!(
            "connection {} unregistered for user {} (last: {})",
            conn,
            user_id,
            was_last
        );
        Some((user_id, was_last))
    }

    /// Whether a connection has joined a room.
    pub async fn in_room(&self, conn: ConnectionId, room: Uuid) -> bool {
        let inner = self.inner.read().await;
        inner
            .rooms
            .get(&room)
            .map(|members| members.contains(&conn))
            .unwrap_or(false)
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.inner.read().await.by_user.contains_key(&user_id)
    }

    /// Push an event to a single connection.
    pub async fn send_to_conn(&self, conn: ConnectionId, event: ServerEvent) {
        let dead = {
            let inner = self.inner.read().await;
            match inner.senders.get(&conn) {
                Some(tx) => tx.send(event).is_err(),
                None => false,
            }
        };
        if dead {
            self.prune(&[conn]).await;
        }
    }

    /// Push an event to every connection of one user.
    pub async fn send_to_user(&self, user_id: Uuid, event: ServerEvent) {
        let dead = {
            let inner = self.inner.read().await;
            let Some(conns) = inner.by_user.get(&user_id) else {
                return;
            };
            conns
                .iter()
                .filter(|conn| match inner.senders.get(conn) {
                    Some(tx) => tx.send(event.clone()).is_err(),
                    None => false,
                })
                .copied()
                .collect::<Vec<_>>()
        };
        self.prune(&dead).await;
    }

    /// Fan an event out to every connection in a room, optionally excluding
    /// one connection (typically the originator). Delivery is independent
    /// per recipient: a dead connection is skipped and pruned, never allowed
    /// to interrupt the rest.
    pub async fn broadcast_room(
        &self,
        room: Uuid,
        event: ServerEvent,
        exclude: Option<ConnectionId>,
    ) {
        let dead = {
            let inner = self.inner.read().await;
            let Some(members) = inner.rooms.get(&room) else {
                return;
            };
            members
                .iter()
                .filter(|conn| Some(**conn) != exclude)
                .filter(|conn| match inner.senders.get(conn) {
                    Some(tx) => tx.send(event.clone()).is_err(),
                    None => false,
                })
                .copied()
                .collect::<Vec<_>>()
        };
        self.prune(&dead).await;
    }

    /// Fan an event out to every connection of each listed user.
    pub async fn broadcast_users(&self, user_ids: &HashSet<Uuid>, event: ServerEvent) {
        let dead = {
            let inner = self.inner.read().await;
            let mut dead = Vec::new();
            for user_id in user_ids {
                let Some(conns) = inner.by_user.get(user_id) else {
                    continue;
                };
                for conn in conns {
                    if let Some(tx) = inner.senders.get(conn) {
                        if tx.send(event.clone()).is_err() {
                            dead.push(*conn);
                        }
                    }
                }
            }
            dead
        };
        self.prune(&dead).await;
    }

    async fn prune(&self, dead: &[ConnectionId]) {
        for conn in dead {
            tracing::debug!("pruning dead connection {}", conn);
            self.unregister(*conn).await;
        }
    }
}

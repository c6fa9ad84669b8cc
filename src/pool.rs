//! Fixed-capacity connection pool.
//!
//! The pool is seeded with `capacity` slots that start out unconnected. A slot is dialed the
//! first time it is handed out and keeps its socket afterwards. Slots are never created or
//! destroyed after construction: at every instant the resting slots plus the checked out slots
//! add up to the capacity.

use crate::{ClientConfig, Command, Connection, Reply};

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

/// Handle to a pool of connection slots. Clones share the same slots.
#[derive(Debug, Clone)]
pub struct Pool {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    /// Address dialed for unconnected slots.
    addr: String,

    capacity: usize,

    /// Demote a slot to unconnected when its last use left the socket in an unknown state.
    reset_faulted: bool,

    /// One permit per resting slot. Callers wait here when every slot is checked out.
    permits: Arc<Semaphore>,

    state: Mutex<State>,
}

#[derive(Debug)]
struct State {
    /// Slots waiting to be handed out. `None` is a slot that has no socket yet.
    resting: VecDeque<Option<Connection>>,

    checked_out: usize,
}

/// A consistent snapshot of the pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Total number of slots, fixed at construction.
    pub capacity: usize,
    /// Slots waiting in the pool.
    pub resting: usize,
    /// Slots held by callers.
    pub checked_out: usize,
    /// Resting slots that hold a live socket.
    pub connected: usize,
}

/// A slot checked out of the pool.
///
/// The slot goes back to the pool when this value is dropped, whatever the outcome of the
/// calls made through it.
#[derive(Debug)]
pub struct PooledConnection {
    shared: Arc<Shared>,

    conn: Option<Connection>,

    /// Set while a call is in flight and kept if the call failed in a way that breaks framing.
    faulted: bool,

    /// Returned to the semaphore after the slot is back in the resting set.
    _permit: OwnedSemaphorePermit,
}

impl Pool {
    /// Create a pool of `config.capacity` unconnected slots. A capacity of zero is raised to one.
    pub fn new(config: &ClientConfig) -> Pool {
        let capacity = config.capacity.max(1);

        let state = State {
            resting: (0..capacity).map(|_| None).collect(),
            checked_out: 0,
        };

        Pool {
            shared: Arc::new(Shared {
                addr: config.addr.clone(),
                capacity,
                reset_faulted: config.reset_faulted,
                permits: Arc::new(Semaphore::new(capacity)),
                state: Mutex::new(state),
            }),
        }
    }

    /// Check a slot out of the pool, waiting until one is resting.
    ///
    /// An unconnected slot is dialed before it is returned. If dialing fails the slot goes back
    /// to the pool unconnected and the error is returned.
    pub async fn acquire(&self) -> crate::Result<PooledConnection> {
        let permit = self
            .shared
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "connection pool closed"))?;

        let slot = self.shared.check_out()?;

        let mut conn = PooledConnection {
            shared: self.shared.clone(),
            conn: slot,
            faulted: false,
            _permit: permit,
        };

        if conn.conn.is_none() {
            debug!(addr = %self.shared.addr, "dialing pooled connection");
            conn.conn = Some(Connection::connect(&self.shared.addr[..]).await?);
        }

        Ok(conn)
    }

    /// Returns the address unconnected slots are dialed to.
    pub fn addr(&self) -> &str {
        &self.shared.addr
    }

    /// Returns the number of slots the pool was built with.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Returns the slot counters, read under one lock so they always add up to the capacity.
    pub fn status(&self) -> PoolStatus {
        let state = self.shared.state.lock().unwrap();

        PoolStatus {
            capacity: self.shared.capacity,
            resting: state.resting.len(),
            checked_out: state.checked_out,
            connected: state.resting.iter().filter(|slot| slot.is_some()).count(),
        }
    }
}

impl Shared {
    fn check_out(&self) -> io::Result<Option<Connection>> {
        let mut state = self.state.lock().unwrap();

        // A permit is only available while a slot is resting, so this does not fail in practice.
        let slot = state
            .resting
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "no resting connection slot"))?;
        state.checked_out += 1;

        Ok(slot)
    }

    fn check_in(&self, slot: Option<Connection>) {
        let mut state = self.state.lock().unwrap();

        state.resting.push_back(slot);
        state.checked_out -= 1;
    }
}

impl PooledConnection {
    /// Write `cmd` and read its reply over the checked out connection.
    ///
    /// I/O and framing failures mark the slot as faulted. Error replies sent by the server do not.
    pub async fn call(&mut self, cmd: &Command) -> crate::Result<Reply> {
        let conn = self.conn.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "pooled connection is not dialed")
        })?;

        // Stays set if this future is dropped halfway through the round trip.
        self.faulted = true;

        let res = conn.call(cmd).await;

        self.faulted = matches!(&res, Err(err) if err.is_fatal());

        res
    }

    /// Returns `true` if the last call left the connection in an unknown state.
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let mut slot = self.conn.take();

        if self.faulted && self.shared.reset_faulted && slot.is_some() {
            warn!(addr = %self.shared.addr, "resetting faulted pooled connection");
            slot = None;
        }

        self.shared.check_in(slot);
    }
}

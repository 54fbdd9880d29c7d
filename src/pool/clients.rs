//! Client admission accounting for a route.
//!
//! Tracks every client of a route in one of three disjoint sets, with
//! constant-time transitions between them. A client detached from all
//! three sets is in the `Undef` state and no longer counted.

use std::collections::HashMap;

pub type ProcessId = i32;

/// Client lifecycle state within its route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientState {
    /// Not attached to any set.
    Undef,
    /// Attached to a server and serving traffic.
    Active,
    /// Waiting for a server connection.
    Queued,
    /// Admitted but not yet authenticated.
    Pending,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    state: ClientState,
    index: usize,
}

/// Membership sets for the clients of one route.
///
/// A client is a member of exactly one set, matching its state; `Undef`
/// clients are members of none and carry no slot.
#[derive(Debug, Default)]
pub struct ClientPool {
    slots: HashMap<ProcessId, Slot>,
    active: Vec<ProcessId>,
    queued: Vec<ProcessId>,
    pending: Vec<ProcessId>,
}

impl ClientPool {
    pub fn new() -> ClientPool {
        ClientPool::default()
    }

    /// Move a client into `state`. Same-state transitions are no-ops;
    /// moving to `Undef` detaches the client without reattaching it.
    pub fn set(&mut self, id: ProcessId, state: ClientState) {
        if let Some(slot) = self.slots.remove(&id) {
            if slot.state == state {
                self.slots.insert(id, slot);
                return;
            }
            self.detach(slot);
        }

        if state == ClientState::Undef {
            return;
        }

        let list = self.list_mut(state);
        list.push(id);
        let index = list.len() - 1;
        self.slots.insert(id, Slot { state, index });
    }

    /// Any client currently in `state`, if the set is non-empty.
    ///
    /// # Panics
    ///
    /// Panics when called with `Undef`.
    pub fn next(&self, state: ClientState) -> Option<ProcessId> {
        self.list(state).first().copied()
    }

    /// Number of clients currently in `state`.
    ///
    /// # Panics
    ///
    /// Panics when called with `Undef`.
    pub fn count(&self, state: ClientState) -> usize {
        self.list(state).len()
    }

    /// Current state of a client; `Undef` when the pool does not know it.
    pub fn state(&self, id: ProcessId) -> ClientState {
        self.slots
            .get(&id)
            .map(|slot| slot.state)
            .unwrap_or(ClientState::Undef)
    }

    /// Clients attached to any of the three sets.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn detach(&mut self, slot: Slot) {
        let index = slot.index;
        let list = self.list_mut(slot.state);
        list.swap_remove(index);
        // The member that filled the hole changed position.
        let moved = list.get(index).copied();
        if let Some(moved) = moved {
            if let Some(moved_slot) = self.slots.get_mut(&moved) {
                moved_slot.index = index;
            }
        }
    }

    fn list(&self, state: ClientState) -> &Vec<ProcessId> {
        match state {
            ClientState::Active => &self.active,
            ClientState::Queued => &self.queued,
            ClientState::Pending => &self.pending,
            ClientState::Undef => panic!("undef clients are not kept on a list"),
        }
    }

    fn list_mut(&mut self, state: ClientState) -> &mut Vec<ProcessId> {
        match state {
            ClientState::Active => &mut self.active,
            ClientState::Queued => &mut self.queued,
            ClientState::Pending => &mut self.pending,
            ClientState::Undef => panic!("undef clients are not kept on a list"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_between_sets() {
        let mut pool = ClientPool::new();
        pool.set(1, ClientState::Active);
        pool.set(2, ClientState::Active);
        pool.set(3, ClientState::Active);

        pool.set(2, ClientState::Queued);
        pool.set(3, ClientState::Pending);

        assert_eq!(pool.count(ClientState::Active), 1);
        assert_eq!(pool.count(ClientState::Queued), 1);
        assert_eq!(pool.count(ClientState::Pending), 1);

        assert_eq!(pool.next(ClientState::Active), Some(1));
        assert_eq!(pool.next(ClientState::Queued), Some(2));
        assert_eq!(pool.next(ClientState::Pending), Some(3));

        assert_eq!(pool.state(1), ClientState::Active);
        assert_eq!(pool.state(2), ClientState::Queued);
        assert_eq!(pool.state(3), ClientState::Pending);
    }

    #[test]
    fn same_state_transition_is_a_noop() {
        let mut pool = ClientPool::new();
        pool.set(7, ClientState::Active);
        pool.set(7, ClientState::Active);

        assert_eq!(pool.count(ClientState::Active), 1);
        assert_eq!(pool.next(ClientState::Active), Some(7));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn undef_detaches_and_allows_reattach() {
        let mut pool = ClientPool::new();
        pool.set(5, ClientState::Queued);
        assert_eq!(pool.count(ClientState::Queued), 1);

        pool.set(5, ClientState::Undef);
        assert_eq!(pool.count(ClientState::Queued), 0);
        assert_eq!(pool.state(5), ClientState::Undef);
        assert!(pool.is_empty());

        pool.set(5, ClientState::Pending);
        assert_eq!(pool.count(ClientState::Pending), 1);
        assert_eq!(pool.next(ClientState::Pending), Some(5));
    }

    #[test]
    fn membership_total_is_conserved_across_moves() {
        let mut pool = ClientPool::new();
        for id in 0..10 {
            pool.set(id, ClientState::Pending);
        }
        assert_eq!(pool.len(), 10);

        for id in 0..10 {
            pool.set(id, ClientState::Queued);
            pool.set(id, ClientState::Active);
        }
        assert_eq!(pool.len(), 10);
        assert_eq!(pool.count(ClientState::Active), 10);
        assert_eq!(pool.count(ClientState::Queued), 0);
        assert_eq!(pool.count(ClientState::Pending), 0);

        pool.set(4, ClientState::Undef);
        assert_eq!(pool.len(), 9);
        assert_eq!(pool.count(ClientState::Active), 9);
    }

    #[test]
    fn detach_keeps_remaining_members_addressable() {
        let mut pool = ClientPool::new();
        pool.set(1, ClientState::Active);
        pool.set(2, ClientState::Active);
        pool.set(3, ClientState::Active);

        // Remove the head; the tail member is swapped into its place.
        pool.set(1, ClientState::Undef);
        assert_eq!(pool.count(ClientState::Active), 2);

        // The swapped member must still transition cleanly.
        pool.set(3, ClientState::Queued);
        assert_eq!(pool.count(ClientState::Active), 1);
        assert_eq!(pool.count(ClientState::Queued), 1);
        assert_eq!(pool.next(ClientState::Active), Some(2));
    }

    #[test]
    fn next_on_empty_set_is_none() {
        let pool = ClientPool::new();
        assert_eq!(pool.next(ClientState::Active), None);
        assert_eq!(pool.next(ClientState::Queued), None);
        assert_eq!(pool.next(ClientState::Pending), None);
    }

    #[test]
    #[should_panic]
    fn next_on_undef_panics() {
        let pool = ClientPool::new();
        let _ = pool.next(ClientState::Undef);
    }
}

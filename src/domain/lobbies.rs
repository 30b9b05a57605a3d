//! Slot-table operations on an already-locked lobby.
//!
//! Everything here takes `&LobbyState` / `&mut LobbyState`, so the caller
//! holds the lobby lock for the whole operation.

use std::sync::Arc;
use crate::state::client::{ClientHandle, Item};
use crate::state::error::{Departure, LobbyError};
use crate::state::lobby::{LobbyState, GAME_ITEM_ID_BASE, ITEM_ID_SLOT_BASE};
use crate::utils::text::names_match;

/// Place a client in the first empty slot
pub fn add_client(
    state: &mut LobbyState,
    lobby_id: i64,
    client: &ClientHandle,
) -> Result<usize, LobbyError> {
    if state.closed {
        return Err(LobbyError::NotFound("lobby"));
    }
    let slot = state
        .clients
        .iter()
        .position(Option::is_none)
        .ok_or(LobbyError::Full)?;

    state.clients[slot] = Some(client.clone());
    client.set_lobby(lobby_id, slot);

    // Slot 0 may mean the lobby was empty; if so the newcomer leads
    if slot == 0 && state.clients[1..].iter().all(Option::is_none) {
        state.leader_id = 0;
    }
    Ok(slot)
}

/// Slot currently holding `client`, checked against its back-reference
pub fn slot_of(state: &LobbyState, client: &ClientHandle) -> Result<usize, LobbyError> {
    let slot = client.lobby_client_id();
    match state.clients.get(slot) {
        Some(Some(occupant)) if Arc::ptr_eq(occupant, client) => Ok(slot),
        _ => {
            log::error!(
                "Client '{}' claims slot {} but the slot holds someone else",
                client.name,
                slot
            );
            Err(LobbyError::StateMismatch { slot })
        }
    }
}

/// Remove a client and clear its lobby back-reference
pub fn remove_client(state: &mut LobbyState, client: &ClientHandle) -> Result<Departure, LobbyError> {
    let slot = slot_of(state, client)?;
    let departure = vacate_slot(state, slot);
    client.clear_lobby();
    Ok(departure)
}

/// Empty `slot` and re-elect the leader. Does not touch the departing client.
pub fn vacate_slot(state: &mut LobbyState, slot: usize) -> Departure {
    state.clients[slot] = None;
    reassign_leader(state, slot)
}

/// Leader becomes the lowest occupied slot other than `leaving_slot`
pub fn reassign_leader(state: &mut LobbyState, leaving_slot: usize) -> Departure {
    let next_leader = state
        .clients
        .iter()
        .enumerate()
        .find(|(slot, c)| *slot != leaving_slot && c.is_some())
        .map(|(slot, _)| slot);

    match next_leader {
        Some(leader_id) => {
            state.leader_id = leader_id;
            Departure::Remaining { leader_id }
        }
        None => Departure::Empty,
    }
}

/// Find by exact serial number or by display name; serial is checked first for each slot
pub fn find_client(
    state: &LobbyState,
    identifier: Option<&str>,
    serial_number: Option<u64>,
) -> Result<ClientHandle, LobbyError> {
    for (_, client) in state.occupants() {
        if serial_number.is_some() && client.serial_number == serial_number {
            return Ok(client.clone());
        }
        if let Some(identifier) = identifier {
            if names_match(&client.name, identifier) {
                return Ok(client.clone());
            }
        }
    }
    Err(LobbyError::NotFound("client"))
}

pub fn add_item(state: &mut LobbyState, item: Item) {
    if state.floor_items.contains_key(&item.item_id) {
        log::warn!("Floor item {:08X} already present, keeping existing entry", item.item_id);
        return;
    }
    state.floor_items.insert(item.item_id, item);
}

pub fn remove_item(state: &mut LobbyState, item_id: u32) -> Result<Item, LobbyError> {
    state
        .floor_items
        .remove(&item_id)
        .ok_or(LobbyError::NotFound("item"))
}

/// Next ID from the slot's own range; wraps back to the range start.
/// Slots without a counter draw from the game range.
pub fn generate_item_id(state: &mut LobbyState, owner_slot: usize) -> u32 {
    let stride = state.item_id_stride;
    match state.next_item_id.get_mut(owner_slot) {
        Some(counter) => {
            let id = *counter;
            let offset = (id - ITEM_ID_SLOT_BASE) % stride;
            *counter = if offset + 1 == stride { id - offset } else { id + 1 };
            id
        }
        None => {
            let id = state.next_game_item_id;
            state.next_game_item_id = id.checked_add(1).unwrap_or(GAME_ITEM_ID_BASE);
            id
        }
    }
}

pub fn assign_item_ids_for_player(state: &mut LobbyState, slot: usize, inventory: &mut [Item]) {
    for item in inventory.iter_mut() {
        item.item_id = generate_item_id(state, slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::client::Client;
    use crate::state::lobby::{
        item_id_stride, slot_item_id_base, LobbySettings, ITEM_ID_SLOT_STRIDE, MAX_LOBBY_CLIENTS,
    };
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

    const LOBBY_ID: i64 = 7;

    fn client(name: &str) -> ClientHandle {
        Arc::new(Client::new(name, None))
    }

    fn with_state<F: FnOnce(&mut LobbyState)>(max_clients: usize, f: F) {
        let mut state = LobbyState::new(max_clients, LobbySettings::default());
        f(&mut state);
    }

    /// Occupied slots and the back-references of every client must agree
    fn assert_consistent(state: &LobbyState, clients: &[ClientHandle]) {
        for (slot, occupant) in state.occupants() {
            assert_eq!(occupant.lobby_id(), Some(LOBBY_ID));
            assert_eq!(occupant.lobby_client_id(), slot);
        }
        for c in clients {
            let seated = state.occupants().any(|(_, o)| Arc::ptr_eq(o, c));
            assert_eq!(seated, c.lobby_id() == Some(LOBBY_ID), "client {}", c.name);
        }
        if state.count_clients() > 0 {
            assert!(state.client(state.leader_id()).is_some());
        }
    }

    #[test]
    fn test_three_clients_leader_sequence() {
        with_state(12, |state| {
            let clients: Vec<_> = (0..3).map(|i| client(&format!("p{}", i))).collect();
            for (i, c) in clients.iter().enumerate() {
                assert_eq!(add_client(state, LOBBY_ID, c).unwrap(), i);
            }
            assert_eq!(state.leader_id(), 0);

            assert_eq!(
                remove_client(state, &clients[0]).unwrap(),
                Departure::Remaining { leader_id: 1 }
            );
            assert_eq!(
                remove_client(state, &clients[1]).unwrap(),
                Departure::Remaining { leader_id: 2 }
            );
            assert_eq!(remove_client(state, &clients[2]).unwrap(), Departure::Empty);
            assert_eq!(state.count_clients(), 0);
            assert_eq!(clients[2].lobby_id(), None);
        });
    }

    #[test]
    fn test_add_stops_at_first_empty_slot() {
        with_state(12, |state| {
            let a = client("a");
            add_client(state, LOBBY_ID, &a).unwrap();
            assert_eq!(state.count_clients(), 1);
            assert!(state.client(1).is_none());
            assert!(state.client(11).is_none());
        });
    }

    #[test]
    fn test_add_reuses_lowest_gap() {
        with_state(4, |state| {
            let clients: Vec<_> = (0..3).map(|i| client(&format!("p{}", i))).collect();
            for c in &clients {
                add_client(state, LOBBY_ID, c).unwrap();
            }
            remove_client(state, &clients[0]).unwrap();
            assert_eq!(state.leader_id(), 1);

            // Filling slot 0 while others remain leaves the leader alone
            let late = client("late");
            assert_eq!(add_client(state, LOBBY_ID, &late).unwrap(), 0);
            assert_eq!(state.leader_id(), 1);
        });
    }

    #[test]
    fn test_add_full_lobby() {
        with_state(2, |state| {
            add_client(state, LOBBY_ID, &client("a")).unwrap();
            add_client(state, LOBBY_ID, &client("b")).unwrap();
            let c = client("c");
            assert_eq!(add_client(state, LOBBY_ID, &c), Err(LobbyError::Full));
            assert_eq!(c.lobby_id(), None);
        });
    }

    #[test]
    fn test_remove_stale_reference() {
        with_state(4, |state| {
            let a = client("a");
            let b = client("b");
            add_client(state, LOBBY_ID, &a).unwrap();
            // b never joined; its default slot index 0 points at a
            assert_eq!(remove_client(state, &b), Err(LobbyError::StateMismatch { slot: 0 }));
            assert_eq!(state.count_clients(), 1);
            assert_eq!(a.lobby_id(), Some(LOBBY_ID));
        });
    }

    #[test]
    fn test_remove_twice_is_mismatch() {
        with_state(4, |state| {
            let a = client("a");
            add_client(state, LOBBY_ID, &a).unwrap();
            add_client(state, LOBBY_ID, &client("b")).unwrap();
            remove_client(state, &a).unwrap();
            assert!(remove_client(state, &a).is_err());
        });
    }

    #[test]
    fn test_random_membership_stays_consistent() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        with_state(12, |state| {
            let pool: Vec<_> = (0..20).map(|i| client(&format!("c{}", i))).collect();
            for _ in 0..2000 {
                let c = &pool[rng.gen_range(0..pool.len())];
                let before: Vec<usize> = state.occupants().map(|(s, _)| s).collect();
                if c.lobby_id() == Some(LOBBY_ID) {
                    let slot = c.lobby_client_id();
                    match remove_client(state, c).unwrap() {
                        Departure::Remaining { leader_id } => {
                            let expected = before.iter().copied().find(|s| *s != slot);
                            assert_eq!(Some(leader_id), expected);
                        }
                        Departure::Empty => assert_eq!(before, vec![slot]),
                    }
                } else {
                    match add_client(state, LOBBY_ID, c) {
                        Ok(slot) => assert!(!before.contains(&slot)),
                        Err(e) => {
                            assert_eq!(e, LobbyError::Full);
                            assert_eq!(before.len(), 12);
                        }
                    }
                }
                assert_consistent(state, &pool);
            }
        });
    }

    #[test]
    fn test_find_client_serial_takes_priority() {
        with_state(4, |state| {
            let named = Arc::new(Client::new("Target", Some(100)));
            let licensed = Arc::new(Client::new("Other", Some(200)));
            add_client(state, LOBBY_ID, &named).unwrap();
            add_client(state, LOBBY_ID, &licensed).unwrap();

            let found = find_client(state, Some("Target"), Some(200)).unwrap();
            // Slot 0 matches by name before slot 1 is reached
            assert!(Arc::ptr_eq(&found, &named));

            let found = find_client(state, Some("Nobody"), Some(200)).unwrap();
            assert!(Arc::ptr_eq(&found, &licensed));

            let found = find_client(state, None, Some(100)).unwrap();
            assert!(Arc::ptr_eq(&found, &named));

            assert_eq!(
                find_client(state, Some("Nobody"), Some(999)).unwrap_err(),
                LobbyError::NotFound("client")
            );
            assert!(find_client(state, None, None).is_err());
        });
    }

    #[test]
    fn test_find_client_ignores_absent_serial() {
        with_state(4, |state| {
            add_client(state, LOBBY_ID, &client("NoLicense")).unwrap();
            assert!(find_client(state, None, Some(5)).is_err());
            assert!(find_client(state, Some("NoLicense"), None).is_ok());
        });
    }

    #[test]
    fn test_item_ids_unique_across_categories() {
        with_state(12, |state| {
            let mut seen = HashSet::new();
            for round in 0..500 {
                for slot in 0..14 {
                    let id = generate_item_id(state, (slot + round) % 14);
                    assert!(seen.insert(id), "duplicate item id {:08X}", id);
                }
            }
            assert_eq!(generate_item_id(state, 0), ITEM_ID_SLOT_BASE + 500);
        });
    }

    #[test]
    fn test_item_id_counters() {
        with_state(4, |state| {
            assert_eq!(generate_item_id(state, 0), ITEM_ID_SLOT_BASE);
            assert_eq!(generate_item_id(state, 0), ITEM_ID_SLOT_BASE + 1);
            assert_eq!(generate_item_id(state, 2), ITEM_ID_SLOT_BASE + 2 * ITEM_ID_SLOT_STRIDE);
            assert_eq!(generate_item_id(state, 4), GAME_ITEM_ID_BASE);
            assert_eq!(generate_item_id(state, usize::MAX), GAME_ITEM_ID_BASE + 1);
        });
    }

    #[test]
    fn test_wide_lobby_slot_ids_stay_below_game_range() {
        with_state(17, |state| {
            let game_ids: HashSet<u32> = (0..0x10001).map(|_| generate_item_id(state, usize::MAX)).collect();
            for slot in 0..17 {
                let id = generate_item_id(state, slot);
                assert!(id < GAME_ITEM_ID_BASE, "slot {} first id {:08X}", slot, id);
                assert!(!game_ids.contains(&id));
            }
        });
    }

    #[test]
    fn test_oversized_lobby_is_capped() {
        with_state(2100, |state| {
            assert_eq!(state.max_clients(), MAX_LOBBY_CLIENTS);
            let last = generate_item_id(state, MAX_LOBBY_CLIENTS - 1);
            assert!(last < GAME_ITEM_ID_BASE);
            assert_eq!(last, slot_item_id_base(MAX_LOBBY_CLIENTS - 1, state.item_id_stride).unwrap());
            assert_eq!(generate_item_id(state, MAX_LOBBY_CLIENTS), GAME_ITEM_ID_BASE);
        });
    }

    #[test]
    fn test_item_id_stride() {
        assert_eq!(item_id_stride(12), ITEM_ID_SLOT_STRIDE);
        assert_eq!(item_id_stride(0), ITEM_ID_SLOT_STRIDE);
        let stride = item_id_stride(17);
        assert!(stride < ITEM_ID_SLOT_STRIDE);
        assert!(ITEM_ID_SLOT_BASE + 17 * stride <= GAME_ITEM_ID_BASE);
        assert!(slot_item_id_base(16, stride).is_some());
        assert_eq!(slot_item_id_base(17, stride), None);
        assert_eq!(slot_item_id_base(usize::MAX, stride), None);
    }

    #[test]
    fn test_slot_counter_wraps_within_its_range() {
        with_state(17, |state| {
            let stride = state.item_id_stride;
            let base = slot_item_id_base(3, stride).unwrap();
            state.next_item_id[3] = base + stride - 1;
            assert_eq!(generate_item_id(state, 3), base + stride - 1);
            assert_eq!(generate_item_id(state, 3), base);
            // Slot 4's range is untouched
            assert_eq!(generate_item_id(state, 4), base + stride);
        });
    }

    #[test]
    fn test_game_counter_wraps_to_game_base() {
        with_state(4, |state| {
            state.next_game_item_id = u32::MAX;
            assert_eq!(generate_item_id(state, usize::MAX), u32::MAX);
            assert_eq!(generate_item_id(state, usize::MAX), GAME_ITEM_ID_BASE);
        });
    }

    #[test]
    fn test_assign_item_ids_for_player() {
        with_state(4, |state| {
            let mut inventory = vec![Item::new(0, [1; 16]), Item::new(0, [2; 16]), Item::new(0, [3; 16])];
            assign_item_ids_for_player(state, 1, &mut inventory);
            let base = ITEM_ID_SLOT_BASE + ITEM_ID_SLOT_STRIDE;
            let ids: Vec<u32> = inventory.iter().map(|i| i.item_id).collect();
            assert_eq!(ids, vec![base, base + 1, base + 2]);
            assert_eq!(inventory[2].data, [3; 16]);
        });
    }

    #[test]
    fn test_floor_item_bookkeeping() {
        with_state(4, |state| {
            add_item(state, Item::new(10, [1; 16]));
            add_item(state, Item::new(10, [9; 16]));
            assert_eq!(state.floor_item_count(), 1);
            assert_eq!(state.floor_item(10).unwrap().data, [1; 16]);

            assert_eq!(remove_item(state, 10).unwrap().data, [1; 16]);
            assert_eq!(remove_item(state, 10), Err(LobbyError::NotFound("item")));
        });
    }
}

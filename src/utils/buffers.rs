use smallvec::SmallVec;
use crate::state::client::ClientHandle;

/// Inline capacity for per-lobby tables; matches the default lobby size
pub const INLINE_SLOTS: usize = 12;

/// Type aliases for per-slot tables that avoid heap allocation for normal lobby sizes
pub type SlotVec = SmallVec<[Option<ClientHandle>; INLINE_SLOTS]>;
pub type CounterVec = SmallVec<[u32; INLINE_SLOTS]>;

/// Build an empty slot table with `capacity` slots
pub fn empty_slots(capacity: usize) -> SlotVec {
    std::iter::repeat_with(|| None).take(capacity).collect()
}

//! Single-flight memo table for resolved slots.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use super::config_graph::{ConfigId, KeyId, ProjectId};
use super::types::Value;

/// A key resolved in one project and configuration stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Slot {
  pub(crate) key: KeyId,
  pub(crate) project: ProjectId,
  pub(crate) stack: Vec<ConfigId>,
}

#[derive(Debug)]
enum SlotState {
  Pending { owner: u64 },
  Ready(Value),
}

#[derive(Debug, Default)]
struct MemoState {
  slots: HashMap<Slot, SlotState>,
  /// resolution id -> resolution id it is blocked on
  waiting: HashMap<u64, u64>,
}

impl MemoState {
  /// Whether `from` is (transitively) blocked on `target`.
  fn waits_on(&self, from: u64, target: u64) -> bool {
    let mut current = from;
    for _ in 0..=self.waiting.len() {
      match self.waiting.get(&current) {
        Some(&next) if next == target => return true,
        Some(&next) => current = next,
        None => return false,
      }
    }
    false
  }
}

pub(crate) enum Claim {
  /// The value was already computed.
  Ready(Value),
  /// The caller now owns the slot and must fulfil or abandon it.
  Owned,
  /// Waiting would block the caller on itself.
  WouldDeadlock,
}

#[derive(Debug, Default)]
pub(crate) struct Memo {
  state: Mutex<MemoState>,
  changed: Condvar,
}

impl Memo {
  fn lock(&self) -> MutexGuard<'_, MemoState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Claim `slot` for `resolution`, blocking while another resolution owns it.
  pub(crate) fn claim(&self, slot: &Slot, resolution: u64) -> Claim {
    let mut state = self.lock();
    loop {
      let owner = match state.slots.get(slot) {
        None => {
          state.slots.insert(slot.clone(), SlotState::Pending { owner: resolution });
          return Claim::Owned;
        }
        Some(SlotState::Ready(value)) => return Claim::Ready(value.clone()),
        Some(SlotState::Pending { owner }) => *owner,
      };

      if owner == resolution || state.waits_on(owner, resolution) {
        return Claim::WouldDeadlock;
      }

      state.waiting.insert(resolution, owner);
      state = self.changed.wait(state).unwrap_or_else(PoisonError::into_inner);
      state.waiting.remove(&resolution);
    }
  }

  pub(crate) fn fulfil(&self, slot: Slot, value: Value) {
    self.lock().slots.insert(slot, SlotState::Ready(value));
    self.changed.notify_all();
  }

  /// Release a pending slot without a value so waiters can retry.
  pub(crate) fn abandon(&self, slot: &Slot) {
    let mut state = self.lock();
    if matches!(state.slots.get(slot), Some(SlotState::Pending { .. })) {
      state.slots.remove(slot);
    }
    drop(state);
    self.changed.notify_all();
  }

  /// Number of memoized values.
  pub(crate) fn ready(&self) -> usize {
    self
      .lock()
      .slots
      .values()
      .filter(|state| matches!(state, SlotState::Ready(_)))
      .count()
  }
}

/// Abandons its slot on drop unless fulfilled, so errors and panics never
/// leave a slot pending.
pub(crate) struct SlotGuard<'m> {
  memo: &'m Memo,
  slot: Option<Slot>,
}

impl<'m> SlotGuard<'m> {
  pub(crate) fn new(memo: &'m Memo, slot: Slot) -> Self {
    Self { memo, slot: Some(slot) }
  }

  pub(crate) fn fulfil(mut self, value: Value) {
    if let Some(slot) = self.slot.take() {
      self.memo.fulfil(slot, value);
    }
  }
}

impl Drop for SlotGuard<'_> {
  fn drop(&mut self) {
    if let Some(slot) = self.slot.take() {
      self.memo.abandon(&slot);
    }
  }
}

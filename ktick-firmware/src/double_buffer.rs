//! Two-slot frame hand-off between the tick producer and a drain consumer.
//!
//! The producer only ever writes the pending slot and the consumer only ever reads the active
//! slot. Ownership moves at [DoubleBuffer::publish], which runs under the device lock when the
//! buffer is wrapped in a [SharedBuffer].

use crate::lock::Lock;

pub struct DoubleBuffer<F> {
    slots: [F; 2],
    active: usize,
    dirty: bool,
    available: bool,
}

impl<F: Clone> DoubleBuffer<F> {
    pub fn new(initial: F) -> Self {
        Self {
            slots: [initial.clone(), initial],
            active: 0,
            dirty: false,
            available: false,
        }
    }

    pub fn start_tick(&mut self) {
        self.dirty = false;
    }

    /// Mutable access to the pending slot. Marks the buffer dirty.
    pub fn pending_mut(&mut self) -> &mut F {
        self.dirty = true;
        &mut self.slots[1 - self.active]
    }

    /// Mutable access to the pending slot without marking the buffer dirty. Used by frames that
    /// are rebuilt from scratch every cycle.
    pub fn rebuild_mut(&mut self) -> &mut F {
        &mut self.slots[1 - self.active]
    }

    pub fn pending(&self) -> &F {
        &self.slots[1 - self.active]
    }

    pub fn active(&self) -> &F {
        &self.slots[self.active]
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn has_new_data(&self) -> bool {
        self.available
    }

    /// Swap the slots if anything was written this cycle. Returns true when a new frame was
    /// published.
    pub fn publish(&mut self) -> bool {
        let dirty = self.dirty;
        self.publish_if(|_, _| dirty)
    }

    /// Swap the slots when `changed(pending, active)` holds. The dirty marker is cleared either
    /// way.
    pub fn publish_if(&mut self, changed: impl FnOnce(&F, &F) -> bool) -> bool {
        self.dirty = false;
        if !changed(self.pending(), self.active()) {
            return false;
        }
        self.active = 1 - self.active;
        let (a, b) = self.slots.split_at_mut(1);
        // the new pending slot starts as a copy of what was just published
        if self.active == 0 {
            b[0].clone_from(&a[0]);
        } else {
            a[0].clone_from(&b[0]);
        }
        self.available = true;
        true
    }

    /// Like [DoubleBuffer::publish_if], but while the active frame is still waiting for a drain
    /// `merge(pending, active)` first folds it into the pending frame. The check and the swap
    /// happen in one step so a frame is either taken by the consumer or carried forward.
    pub fn publish_merged(
        &mut self,
        merge: impl FnOnce(&mut F, &F),
        changed: impl FnOnce(&F, &F) -> bool,
    ) -> bool {
        if self.available {
            let (a, b) = self.slots.split_at_mut(1);
            if self.active == 0 {
                merge(&mut b[0], &a[0]);
            } else {
                merge(&mut a[0], &b[0]);
            }
        }
        self.publish_if(changed)
    }

    /// Copy the active slot into `scratch` if a frame was published since the last take.
    pub fn take_into(&mut self, scratch: &mut F) -> bool {
        if !self.available {
            return false;
        }
        scratch.clone_from(&self.slots[self.active]);
        self.available = false;
        true
    }

    /// Flag the active frame as unsent again so the next drain picks it up.
    pub fn retry(&mut self) {
        self.available = true;
    }
}

/// A [DoubleBuffer] behind a [Lock]; the form output devices hold.
pub struct SharedBuffer<F> {
    inner: Lock<DoubleBuffer<F>>,
}

impl<F: Clone + Send> SharedBuffer<F> {
    pub fn new(initial: F) -> Self {
        Self {
            inner: Lock::new(DoubleBuffer::new(initial)),
        }
    }

    pub fn start_tick(&self) {
        self.inner.lock(|b| b.start_tick());
    }

    /// Mutate the pending frame, marking it dirty.
    pub fn update<R>(&self, f: impl FnOnce(&mut F) -> R) -> R {
        self.inner.lock(|b| f(b.pending_mut()))
    }

    pub fn rebuild<R>(&self, f: impl FnOnce(&mut F) -> R) -> R {
        self.inner.lock(|b| f(b.rebuild_mut()))
    }

    pub fn publish(&self) -> bool {
        self.inner.lock(|b| b.publish())
    }

    pub fn publish_if(&self, changed: impl FnOnce(&F, &F) -> bool) -> bool {
        self.inner.lock(|b| b.publish_if(changed))
    }

    pub fn publish_merged(
        &self,
        merge: impl FnOnce(&mut F, &F),
        changed: impl FnOnce(&F, &F) -> bool,
    ) -> bool {
        self.inner.lock(|b| b.publish_merged(merge, changed))
    }

    pub fn take_into(&self, scratch: &mut F) -> bool {
        self.inner.lock(|b| b.take_into(scratch))
    }

    pub fn retry(&self) {
        self.inner.lock(|b| b.retry());
    }

    pub fn has_new_data(&self) -> bool {
        self.inner.lock(|b| b.has_new_data())
    }

    pub fn read_active<R>(&self, f: impl FnOnce(&F) -> R) -> R {
        self.inner.lock(|b| f(b.active()))
    }

    pub fn read_pending<R>(&self, f: impl FnOnce(&F) -> R) -> R {
        self.inner.lock(|b| f(b.pending()))
    }
}

#[cfg(test)]
#[path = "double_buffer_test.rs"]
mod test;

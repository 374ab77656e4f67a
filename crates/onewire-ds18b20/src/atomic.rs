//! # Atomic Sections
//!
//! Some instants of the 1-Wire protocol tolerate only a few microseconds of
//! jitter: the presence sample after a reset and the whole body of a bit
//! slot. An interrupt firing there corrupts the transfer, so the bus master
//! runs those parts inside an [`AtomicSection`].
//!
//! An [`AtomicSection`] masks interrupts when it is entered and restores the
//! state saved at entry when it is dropped, so every exit path, early `?`
//! returns included, leaves the interrupt state as it was found.

/// A host primitive able to suspend and restore interrupts.
pub trait InterruptMask {
    /// The interrupt state saved on entry.
    type State;

    /// Masks interrupts, returning the state that was active before.
    fn mask(&mut self) -> Self::State;

    /// Restores a previously saved interrupt state.
    ///
    /// # Safety
    ///
    /// `state` must come from the matching [`InterruptMask::mask`] call and
    /// nested states must be restored in reverse order.
    unsafe fn restore(&mut self, state: Self::State);
}

/// A scoped guard keeping interrupts masked while it is alive.
#[must_use = "interrupts are restored as soon as the section is dropped"]
pub struct AtomicSection<'a, M: InterruptMask> {
    mask: &'a mut M,
    state: Option<M::State>,
}

impl<'a, M: InterruptMask> AtomicSection<'a, M> {
    /// Masks interrupts until the returned guard is dropped.
    #[inline]
    pub fn enter(mask: &'a mut M) -> Self {
        let state = mask.mask();
        Self {
            mask,
            state: Some(state),
        }
    }
}

impl<M: InterruptMask> Drop for AtomicSection<'_, M> {
    #[inline]
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            // SAFETY: the state comes from `enter`, and the guard mutably
            // borrows the mask, so guards on it drop in reverse order.
            unsafe { self.mask.restore(state) }
        }
    }
}

/// An [`InterruptMask`] for hosts without interrupts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMask;

impl InterruptMask for NoMask {
    type State = ();

    #[inline]
    fn mask(&mut self) -> Self::State {}

    #[inline]
    unsafe fn restore(&mut self, _state: Self::State) {}
}

/// An [`InterruptMask`] backed by the global `critical-section`
/// implementation provided by the target HAL.
#[cfg(feature = "critical-section")]
#[derive(Debug, Default, Clone, Copy)]
pub struct CriticalSectionMask;

#[cfg(feature = "critical-section")]
impl InterruptMask for CriticalSectionMask {
    type State = critical_section::RestoreState;

    #[inline]
    fn mask(&mut self) -> Self::State {
        // SAFETY: the returned state is handed back to `release` through
        // `restore`, whose contract enforces the nesting order.
        unsafe { critical_section::acquire() }
    }

    #[inline]
    unsafe fn restore(&mut self, state: Self::State) {
        // SAFETY: guaranteed by the caller.
        unsafe { critical_section::release(state) }
    }
}

/// Fallback latch state.
///
/// Transitions are driven once per resolution cycle:
/// - `Normal` -> `Fallback`: the cycle found no healthy primary backend
/// - `Fallback` -> `Normal`: the cycle found at least one healthy primary backend
///
/// Entering is lagged by one cycle (the entering cycle still publishes the last-known-good
/// group); leaving takes effect in the same cycle. The lag lives in the resolver; the latch
/// only reports which transition happened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LatchState {
    /// Serving from primary backends.
    #[default]
    Normal,
    /// Serving from fallback backends until a primary recovers.
    Fallback,
}

/// Transition reported by [`FallbackLatch::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchTransition {
    Unchanged,
    EnteredFallback,
    ExitedFallback,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FallbackLatch {
    state: LatchState,
}

impl FallbackLatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> LatchState {
        self.state
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.state == LatchState::Fallback
    }

    /// Feeds one cycle's primary health into the latch.
    pub fn observe(&mut self, healthy_primary_available: bool) -> LatchTransition {
        match (self.state, healthy_primary_available) {
            (LatchState::Normal, false) => {
                self.state = LatchState::Fallback;
                LatchTransition::EnteredFallback
            }
            (LatchState::Fallback, true) => {
                self.state = LatchState::Normal;
                LatchTransition::ExitedFallback
            }
            _ => LatchTransition::Unchanged,
        }
    }

    /// Forces the latch back to `Normal`.
    pub fn reset(&mut self) {
        self.state = LatchState::Normal;
    }
}

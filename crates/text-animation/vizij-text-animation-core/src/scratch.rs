//! Scratch buffers and tick lifecycle.
//!
//! Reused across characters and ticks so the per-character loop does not
//! allocate.

/// Per-animator reusable buffers.
#[derive(Debug, Default)]
pub struct Scratch {
    /// Resolved tag stack of the character being animated.
    pub stack: Vec<usize>,
}

impl Scratch {
    pub fn with_capacity(stack: usize) -> Self {
        Self {
            stack: Vec::with_capacity(stack),
        }
    }

    #[inline]
    pub fn begin_tick(&mut self) {
        self.stack.clear();
    }
}

//! Double-buffered temporal state.

/// Two slots, one "current" (written this frame) and one "previous" (read
/// this frame). [`swap`](Self::swap) flips the roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingPong<T> {
    slots: [T; 2],
    current: usize,
}

impl<T> PingPong<T> {
    #[must_use]
    pub fn new(first: T, second: T) -> Self {
        Self {
            slots: [first, second],
            current: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[inline]
    #[must_use]
    pub fn previous_index(&self) -> usize {
        1 - self.current
    }

    #[inline]
    #[must_use]
    pub fn current(&self) -> &T {
        &self.slots[self.current]
    }

    #[inline]
    #[must_use]
    pub fn previous(&self) -> &T {
        &self.slots[self.previous_index()]
    }

    /// The next frame writes what this frame read.
    #[inline]
    pub fn swap(&mut self) {
        self.current = self.previous_index();
    }

    pub fn slots(&self) -> &[T; 2] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [T; 2] {
        &mut self.slots
    }
}

impl<T: Default> Default for PingPong<T> {
    fn default() -> Self {
        Self::new(T::default(), T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_alternates_roles() {
        let mut pp = PingPong::new("a", "b");
        assert_eq!((*pp.current(), *pp.previous()), ("a", "b"));
        pp.swap();
        assert_eq!((*pp.current(), *pp.previous()), ("b", "a"));
        pp.swap();
        assert_eq!(pp.current_index(), 0);
    }
}

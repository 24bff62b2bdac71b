//! Fixed-capacity sample history.
//!
//! Backing store is an inline array plus a head index; pushing onto a full
//! history overwrites the oldest slot in O(1) without allocating.

/// Bounded FIFO of the last `N` samples, oldest first.
#[derive(Debug, Clone)]
pub struct History<T, const N: usize> {
    slots: [T; N],
    /// Index of the oldest sample.
    head: usize,
    len: usize,
}

impl<T: Copy + Default, const N: usize> Default for History<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + Default, const N: usize> History<T, N> {
    pub fn new() -> Self {
        assert!(N > 0, "history capacity must be non-zero");
        Self {
            slots: [T::default(); N],
            head: 0,
            len: 0,
        }
    }

    /// Append a sample, evicting and returning the oldest one when full.
    pub fn push(&mut self, value: T) -> Option<T> {
        if self.len < N {
            self.slots[(self.head + self.len) % N] = value;
            self.len += 1;
            None
        } else {
            let evicted = std::mem::replace(&mut self.slots[self.head], value);
            self.head = (self.head + 1) % N;
            Some(evicted)
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<T> {
        if self.len == 0 {
            None
        } else {
            Some(self.slots[(self.head + self.len - 1) % N])
        }
    }

    /// Samples from oldest to newest.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = T> + '_ {
        (0..self.len).map(move |i| self.slots[(self.head + i) % N])
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_in_order() {
        let mut h: History<i32, 4> = History::new();
        assert!(h.is_empty());
        assert_eq!(h.latest(), None);
        h.push(1);
        h.push(2);
        assert_eq!(h.to_vec(), vec![1, 2]);
        assert_eq!(h.latest(), Some(2));
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut h: History<i32, 3> = History::new();
        assert_eq!(h.push(1), None);
        assert_eq!(h.push(2), None);
        assert_eq!(h.push(3), None);
        assert_eq!(h.push(4), Some(1));
        assert_eq!(h.push(5), Some(2));
        assert_eq!(h.len(), 3);
        assert_eq!(h.to_vec(), vec![3, 4, 5]);
        assert_eq!(h.latest(), Some(5));
    }

    #[test]
    fn wraps_many_times() {
        let mut h: History<u32, 10> = History::new();
        for i in 0..1000 {
            h.push(i);
            assert!(h.len() <= h.capacity());
        }
        assert_eq!(h.to_vec(), (990..1000).collect::<Vec<_>>());
    }

    #[test]
    fn clear_resets() {
        let mut h: History<f64, 2> = History::new();
        h.push(1.0);
        h.push(2.0);
        h.push(3.0);
        h.clear();
        assert!(h.is_empty());
        h.push(9.0);
        assert_eq!(h.to_vec(), vec![9.0]);
    }
}

/// Application-level count of deliveries beyond the first.
///
/// Independent of the engine's own deduplication, which normally keeps this at zero for a
/// single published message. A non-zero count is an observation, not an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DuplicateCounter {
    deliveries: u64,
}

impl DuplicateCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a delivery and returns the updated duplicate count.
    pub fn record(&mut self) -> u64 {
        self.deliveries += 1;
        self.count()
    }

    /// Deliveries beyond the first.
    pub fn count(&self) -> u64 {
        self.deliveries.saturating_sub(1)
    }

    pub fn deliveries(&self) -> u64 {
        self.deliveries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn first_delivery_is_not_a_duplicate() {
        let mut counter = DuplicateCounter::new();
        assert_eq!(counter.count(), 0);
        assert_eq!(counter.record(), 0);
        assert_eq!(counter.deliveries(), 1);
    }

    proptest! {
        #[test]
        fn each_later_delivery_adds_one(n in 1u64..500) {
            let mut counter = DuplicateCounter::new();
            let mut previous = counter.record();
            for _ in 1..n {
                let next = counter.record();
                prop_assert_eq!(next, previous + 1);
                previous = next;
            }
            prop_assert_eq!(counter.count(), n - 1);
        }
    }
}

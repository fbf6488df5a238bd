use indexmap::IndexSet;

/// Distinct selectors in the order they were first discovered.
#[derive(Debug, Default, Clone)]
pub struct SelectorCollector {
    selectors: IndexSet<[u8; 4]>,
}

impl SelectorCollector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a selector, returning false when it was already known.
    pub fn record(&mut self, selector: [u8; 4]) -> bool {
        self.selectors.insert(selector)
    }

    /// Whether `selector` has been recorded.
    pub fn contains(&self, selector: &[u8; 4]) -> bool {
        self.selectors.contains(selector)
    }

    /// Number of distinct selectors.
    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    /// Selectors in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8; 4]> {
        self.selectors.iter()
    }

    /// Consumes the collector, keeping discovery order.
    pub fn into_vec(self) -> Vec<[u8; 4]> {
        self.selectors.into_iter().collect()
    }
}

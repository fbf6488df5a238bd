use crate::value::AbstractValue;
use serde::Serialize;
use std::collections::HashSet;

/// A selector comparison seen as a branch condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SelectorMatch {
    /// The constant compared against the selector bytes.
    pub selector: [u8; 4],
    /// Offset of the comparison instruction.
    pub origin: usize,
}

/// Recognizes dispatcher comparisons among branch conditions.
///
/// Equality tests, their negations and the `XOR`/`SUB` difference forms all count. Each
/// comparison site reports a given constant once, however many paths reach it.
#[derive(Debug, Default)]
pub struct DispatcherMatcher {
    seen: HashSet<(usize, [u8; 4])>,
}

impl DispatcherMatcher {
    /// Creates a matcher that has seen no comparison sites.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspects the condition of a `JUMPI`. Returns a match the first time a comparison site
    /// and constant pair is seen.
    pub fn inspect(&mut self, condition: &AbstractValue) -> Option<SelectorMatch> {
        let test = condition.selector_test()?;
        if !self.seen.insert((test.origin, test.selector)) {
            return None;
        }
        Some(SelectorMatch {
            selector: test.selector,
            origin: test.origin,
        })
    }

    /// Distinct comparison sites reported so far.
    pub fn sites(&self) -> usize {
        self.seen.len()
    }
}

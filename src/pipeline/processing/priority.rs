use std::collections::BTreeMap;

use crate::domain::{Attribute, SourceId};

/// Externally supplied source preference: attribute -> ordered sources, with a fallback order.
///
/// Sources missing from a list rank after every listed source, in `SourceId` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePriority {
    default: Vec<SourceId>,
    overrides: BTreeMap<Attribute, Vec<SourceId>>,
}

impl Default for SourcePriority {
    fn default() -> Self {
        let mut overrides = BTreeMap::new();
        overrides.insert(Attribute::Description, vec![SourceId::Scrape, SourceId::Api]);
        Self::new(vec![SourceId::Api, SourceId::Scrape], overrides)
    }
}

impl SourcePriority {
    pub fn new(default: Vec<SourceId>, overrides: BTreeMap<Attribute, Vec<SourceId>>) -> Self {
        Self { default, overrides }
    }

    pub fn order_for(&self, attr: Attribute) -> &[SourceId] {
        self.overrides.get(&attr).unwrap_or(&self.default)
    }

    pub fn default_order(&self) -> &[SourceId] {
        &self.default
    }

    /// Rank of a source for an attribute; lower wins
    pub fn rank(&self, attr: Attribute, source: SourceId) -> (usize, SourceId) {
        let order = self.order_for(attr);
        let position = order.iter().position(|s| *s == source).unwrap_or(order.len());
        (position, source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = SourcePriority::default();
        assert!(policy.rank(Attribute::Outcome, SourceId::Api) < policy.rank(Attribute::Outcome, SourceId::Scrape));
        assert!(
            policy.rank(Attribute::Description, SourceId::Scrape) < policy.rank(Attribute::Description, SourceId::Api)
        );
    }

    #[test]
    fn test_unlisted_source_ranks_last() {
        let policy = SourcePriority::new(vec![SourceId::Scrape], BTreeMap::new());
        assert!(policy.rank(Attribute::RocketVariant, SourceId::Scrape) < policy.rank(Attribute::RocketVariant, SourceId::Api));
    }
}

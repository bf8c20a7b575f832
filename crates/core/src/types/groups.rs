//! Interest group selections configured for new subscribers.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::id::{CategoryId, GroupId};

/// Groups new subscribers are added to, keyed by interest category.
///
/// Groups configured without a category are kept under the empty category id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupSelections(BTreeMap<CategoryId, BTreeSet<GroupId>>);

impl GroupSelections {
    /// Parse `category:group` pairs (or bare group ids) separated by commas.
    ///
    /// Blank entries are skipped.
    ///
    /// ```
    /// use commerce_mailchimp_core::GroupSelections;
    ///
    /// let groups = GroupSelections::parse("cat1:a, cat1:b, c");
    /// assert_eq!(groups.group_ids().count(), 3);
    /// ```
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let mut selections = Self::default();
        for entry in input.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (category, group) = entry.split_once(':').unwrap_or(("", entry));
            let group = group.trim();
            if group.is_empty() {
                continue;
            }
            selections.insert(CategoryId::new(category.trim()), GroupId::new(group));
        }
        selections
    }

    pub fn insert(&mut self, category: CategoryId, group: GroupId) {
        self.0.entry(category).or_default().insert(group);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeSet::is_empty)
    }

    /// All selected group ids, across categories.
    pub fn group_ids(&self) -> impl Iterator<Item = &GroupId> {
        self.0.values().flatten()
    }

    /// Whether a group is selected, in any category.
    #[must_use]
    pub fn contains(&self, group: &GroupId) -> bool {
        self.0.values().any(|groups| groups.contains(group))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs_and_bare_ids() {
        let groups = GroupSelections::parse("abc:g1,abc:g2, ,def:g3,g4,xyz:");
        let ids: Vec<&str> = groups.group_ids().map(GroupId::as_str).collect();
        assert_eq!(ids.len(), 4);
        assert!(groups.contains(&GroupId::new("g1")));
        assert!(groups.contains(&GroupId::new("g4")));
        assert!(!groups.contains(&GroupId::new("xyz")));
    }

    #[test]
    fn test_empty() {
        assert!(GroupSelections::parse("").is_empty());
        assert!(GroupSelections::parse(" , ").is_empty());
        assert!(!GroupSelections::parse("g").is_empty());
    }
}

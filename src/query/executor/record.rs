//! Match records produced by the pattern matcher

/// What a pattern slot is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Bound {
    Node(usize),
    Edge(usize),
}

/// One complete or partial match.
///
/// `slots` is indexed by the plan's slot numbers; `edges` lists every edge
/// traversed so far, including those of anonymous and variable-length hops.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Record {
    slots: Vec<Option<Bound>>,
    pub(crate) edges: Vec<usize>,
}

impl Record {
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: vec![None; slot_count],
            edges: Vec::new(),
        }
    }

    pub fn get(&self, slot: usize) -> Option<Bound> {
        self.slots.get(slot).copied().flatten()
    }

    pub fn node(&self, slot: usize) -> Option<usize> {
        match self.get(slot) {
            Some(Bound::Node(id)) => Some(id),
            _ => None,
        }
    }

    /// Bind `value` to an empty slot, or check it against the existing binding.
    /// Returns `Some(true)` when newly bound, `Some(false)` when it was already
    /// bound to the same value, `None` on conflict.
    pub fn bind(&mut self, slot: usize, value: Bound) -> Option<bool> {
        match self.slots[slot] {
            Some(existing) => (existing == value).then_some(false),
            None => {
                self.slots[slot] = Some(value);
                Some(true)
            }
        }
    }

    pub fn unbind(&mut self, slot: usize) {
        self.slots[slot] = None;
    }

    /// Bound nodes, in slot order
    pub fn bound_nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().filter_map(|s| match s {
            Some(Bound::Node(id)) => Some(*id),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_and_conflict() {
        let mut record = Record::new(2);
        assert_eq!(record.bind(0, Bound::Node(3)), Some(true));
        assert_eq!(record.bind(0, Bound::Node(3)), Some(false));
        assert_eq!(record.bind(0, Bound::Node(4)), None);
        assert_eq!(record.bind(0, Bound::Edge(3)), None);
        assert_eq!(record.node(0), Some(3));
        record.unbind(0);
        assert_eq!(record.get(0), None);
        assert_eq!(record.bound_nodes().count(), 0);
    }
}

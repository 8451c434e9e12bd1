//! Record diffing for declarative sub-resource collections.
//!
//! Remote mutation APIs for collections like access rules are incremental
//! (authorize one rule, revoke one rule); there is no replace-the-set call.
//! Replacing wholesale would revoke and reauthorize unchanged rules and
//! cause disruptive flapping, so callers diff the declared collection
//! against the live one and apply only the delta.

/// Minimal plan to move an `old` collection to a `new` one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDiff<T> {
    pub to_add: Vec<T>,
    pub to_remove: Vec<T>,
}

impl<T> RecordDiff<T> {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Total number of plan entries.
    pub fn len(&self) -> usize {
        self.to_add.len() + self.to_remove.len()
    }
}

/// Diff two unordered record collections by whole-value equality.
///
/// Both inputs are treated as multisets: each record in `new` consumes at
/// most one matching record in `old`, so duplicates count per multiplicity.
/// Records carry no identity beyond their field values; a changed field
/// shows up as one removal plus one addition. Order of inputs and outputs
/// is not meaningful.
pub fn diff_records<T: PartialEq + Clone>(old: &[T], new: &[T]) -> RecordDiff<T> {
    let mut matched = vec![false; old.len()];
    let mut to_add = Vec::new();

    for record in new {
        match (0..old.len()).find(|&i| !matched[i] && old[i] == *record) {
            Some(i) => matched[i] = true,
            None => to_add.push(record.clone()),
        }
    }

    let to_remove = old
        .iter()
        .enumerate()
        .filter(|(i, _)| !matched[*i])
        .map(|(_, record)| record.clone())
        .collect();

    RecordDiff { to_add, to_remove }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct PortRule {
        from_port: u16,
        to_port: u16,
        cidr: &'static str,
        protocol: &'static str,
    }

    fn rule(port: u16, protocol: &'static str) -> PortRule {
        PortRule {
            from_port: port,
            to_port: port,
            cidr: "192.168.0.0/24",
            protocol,
        }
    }

    #[test]
    fn identical_collections_yield_empty_plan() {
        let rules = vec![rule(8443, "TCP"), rule(8888, "UDP")];
        let plan = diff_records(&rules, &rules);
        assert!(plan.is_empty());
    }

    #[test]
    fn permutation_does_not_matter() {
        let old = vec![rule(8443, "TCP"), rule(8888, "UDP"), rule(9000, "TCP")];
        let new = vec![rule(9000, "TCP"), rule(8443, "TCP"), rule(8888, "UDP")];
        let plan = diff_records(&old, &new);
        assert!(plan.is_empty());
    }

    #[test]
    fn empty_old_adds_everything() {
        let new = vec![rule(8443, "TCP"), rule(8888, "UDP")];
        let plan = diff_records(&[], &new);
        assert_eq!(plan.to_add, new);
        assert!(plan.to_remove.is_empty());
    }

    #[test]
    fn empty_new_removes_everything() {
        let old = vec![rule(8443, "TCP"), rule(8888, "UDP")];
        let plan = diff_records(&old, &[]);
        assert!(plan.to_add.is_empty());
        assert_eq!(plan.to_remove, old);
    }

    #[test]
    fn disjoint_collections_swap_entirely() {
        let old = vec![rule(1000, "TCP"), rule(1001, "TCP")];
        let new = vec![rule(2000, "UDP"), rule(2001, "UDP")];
        let plan = diff_records(&old, &new);
        assert_eq!(plan.to_add, new);
        assert_eq!(plan.to_remove, old);
    }

    #[test]
    fn addition_leaves_existing_rule_alone() {
        let old = vec![rule(8443, "TCP")];
        let new = vec![rule(8443, "TCP"), rule(8888, "TCP")];
        let plan = diff_records(&old, &new);
        assert_eq!(plan.to_add, vec![rule(8888, "TCP")]);
        assert!(plan.to_remove.is_empty());
    }

    #[test]
    fn changed_field_is_remove_plus_add() {
        // Protocol flip on the same port range: no modify-in-place.
        let old = vec![rule(8443, "TCP")];
        let new = vec![rule(8443, "UDP")];
        let plan = diff_records(&old, &new);
        assert_eq!(plan.to_add, vec![rule(8443, "UDP")]);
        assert_eq!(plan.to_remove, vec![rule(8443, "TCP")]);
    }

    #[test]
    fn duplicates_count_per_multiplicity() {
        let old = vec![rule(8443, "TCP")];
        let new = vec![rule(8443, "TCP"), rule(8443, "TCP")];
        let plan = diff_records(&old, &new);
        assert_eq!(plan.to_add, vec![rule(8443, "TCP")]);
        assert!(plan.to_remove.is_empty());

        let reverse = diff_records(&new, &old);
        assert!(reverse.to_add.is_empty());
        assert_eq!(reverse.to_remove, vec![rule(8443, "TCP")]);
    }
}

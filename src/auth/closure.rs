//! The upward closure of a user's group memberships.

use std::collections::HashMap;

use tokio_postgres::GenericClient;

use crate::{model::Key, prelude::*};


/// Traversal depth bound. Groups first reachable beyond this many subgroup
/// hops are ignored; the resolver emits a warning event when that happens.
pub(crate) const MAX_GROUP_DEPTH: u32 = 10;

/// All groups a user belongs to, directly or through nested subgroups, each
/// with the minimal number of subgroup hops needed to reach it (0 for direct
/// memberships).
#[derive(Debug, Default)]
pub(crate) struct GroupClosure {
    distances: HashMap<Key, u32>,
}

impl GroupClosure {
    pub(crate) fn distance(&self, group: Key) -> Option<u32> {
        self.distances.get(&group).copied()
    }

    pub(crate) fn groups(&self) -> impl Iterator<Item = Key> + '_ {
        self.distances.keys().copied()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }
}

/// Loads a user's direct memberships and the full subgroup edge set, then
/// walks the closure. The boolean is `true` if the walk was truncated by
/// [`MAX_GROUP_DEPTH`].
pub(crate) async fn load(
    db: &impl GenericClient,
    user: Key,
) -> Result<(GroupClosure, bool)> {
    let direct = db.query(
        "select group_id from role_manager_user_groups where user_id = $1",
        &[&user],
    ).await?
        .into_iter()
        .map(|row| row.get(0))
        .collect::<Vec<Key>>();

    if direct.is_empty() {
        return Ok((GroupClosure::default(), false));
    }

    // The whole edge set is fetched in one go: policy graphs are small, and
    // walking in memory keeps minimum distances and the depth bound in one
    // place.
    let mut edges: HashMap<Key, Vec<Key>> = HashMap::new();
    let rows = db.query(
        "select child_group_id, parent_group_id from role_manager_group_subgroups",
        &[],
    ).await?;
    for row in rows {
        edges.entry(row.get(0)).or_default().push(row.get(1));
    }

    Ok(walk(&direct, &edges))
}

/// Breadth-first walk from the direct memberships along child→parent edges.
/// Deduplicates by group while keeping the minimal distance. The walk stops
/// at [`MAX_GROUP_DEPTH`]; the boolean reports whether that dropped any
/// group. The bound also guarantees termination if the stored edge set ever
/// contains a cycle (it shouldn't, edge insertion refuses cycles).
pub(crate) fn walk(direct: &[Key], edges: &HashMap<Key, Vec<Key>>) -> (GroupClosure, bool) {
    let mut distances = HashMap::new();
    let mut frontier = Vec::new();
    for &group in direct {
        if !distances.contains_key(&group) {
            distances.insert(group, 0);
            frontier.push(group);
        }
    }

    let mut depth = 0;
    while !frontier.is_empty() && depth < MAX_GROUP_DEPTH {
        let mut next = Vec::new();
        for group in frontier {
            for &parent in edges.get(&group).map(Vec::as_slice).unwrap_or(&[]) {
                if !distances.contains_key(&parent) {
                    distances.insert(parent, depth + 1);
                    next.push(parent);
                }
            }
        }
        frontier = next;
        depth += 1;
    }

    // Anything still reachable from the last frontier was cut off.
    let truncated = frontier.iter().any(|group| {
        edges.get(group)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .any(|parent| !distances.contains_key(parent))
    });

    (GroupClosure { distances }, truncated)
}


#[cfg(test)]
mod tests {
    use super::*;

    fn edges(pairs: &[(i64, i64)]) -> HashMap<Key, Vec<Key>> {
        let mut map: HashMap<Key, Vec<Key>> = HashMap::new();
        for &(child, parent) in pairs {
            map.entry(Key(child)).or_default().push(Key(parent));
        }
        map
    }

    /// A chain of `len` edges starting at group 0: 0 → 1 → 2 → ...
    fn chain(len: i64) -> HashMap<Key, Vec<Key>> {
        edges(&(0..len).map(|i| (i, i + 1)).collect::<Vec<_>>())
    }

    #[test]
    fn direct_memberships_have_distance_zero() {
        let (closure, truncated) = walk(&[Key(1), Key(2)], &HashMap::new());
        assert_eq!(closure.distance(Key(1)), Some(0));
        assert_eq!(closure.distance(Key(2)), Some(0));
        assert_eq!(closure.distance(Key(3)), None);
        assert!(!truncated);
    }

    #[test]
    fn minimum_distance_wins_in_a_diamond() {
        // 0 reaches 3 both via 1 and via 2, and 2 is also a direct
        // membership, so 3 is one hop away.
        let edges = edges(&[(0, 1), (0, 2), (1, 3), (2, 3)]);
        let (closure, truncated) = walk(&[Key(0), Key(2)], &edges);
        assert_eq!(closure.distance(Key(0)), Some(0));
        assert_eq!(closure.distance(Key(1)), Some(1));
        assert_eq!(closure.distance(Key(2)), Some(0));
        assert_eq!(closure.distance(Key(3)), Some(1));
        assert!(!truncated);
    }

    #[test]
    fn depth_ten_is_included() {
        let (closure, truncated) = walk(&[Key(0)], &chain(10));
        assert_eq!(closure.distance(Key(10)), Some(10));
        assert!(!truncated);
    }

    #[test]
    fn depth_eleven_is_cut_off() {
        let (closure, truncated) = walk(&[Key(0)], &chain(11));
        assert_eq!(closure.distance(Key(10)), Some(10));
        assert_eq!(closure.distance(Key(11)), None);
        assert!(truncated);
    }

    #[test]
    fn cyclic_edge_data_terminates() {
        let edges = edges(&[(1, 2), (2, 3), (3, 1)]);
        let (closure, truncated) = walk(&[Key(1)], &edges);
        assert_eq!(closure.distance(Key(1)), Some(0));
        assert_eq!(closure.distance(Key(2)), Some(1));
        assert_eq!(closure.distance(Key(3)), Some(2));
        assert!(!truncated);
    }
}

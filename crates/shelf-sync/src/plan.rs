use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use shelf_log::tree_sort;
use shelf_types::{NodeUuid, SyncDirection, SyncNode};

/// What each side must do to converge.
///
/// `push` and `pull` carry the transfer flags; the two delete lists carry
/// bare identities.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPlan {
    /// Incoming nodes storage must take.
    pub push: Vec<SyncNode>,
    /// Storage nodes the client must take, parents first.
    pub pull: Vec<SyncNode>,
    /// Storage-side nodes older than the last sync and absent from the
    /// incoming snapshot.
    pub delete: Vec<SyncNode>,
    /// Incoming-side nodes older than the last sync and absent from storage.
    pub delete_in_storage: Vec<SyncNode>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.push.is_empty()
            && self.pull.is_empty()
            && self.delete.is_empty()
            && self.delete_in_storage.is_empty()
    }
}

/// Diff an incoming snapshot against the storage snapshot.
///
/// Common uuids go to whichever side has the strictly newer
/// `date_modified`. A uuid present on one side only is a tombstone when its
/// `date_modified` predates `last_sync`, and new otherwise. Push and pull
/// are each ordered parents first.
///
/// In [`SyncDirection::PullOnly`] storage is canonical: nothing is pushed or
/// deleted from storage, every storage-only uuid is pulled, and every
/// incoming-only uuid is listed in `delete`.
pub fn classify(
    direction: SyncDirection,
    storage: &[SyncNode],
    incoming: &[SyncNode],
    last_sync: i64,
) -> SyncPlan {
    let storage_index: HashMap<&NodeUuid, &SyncNode> = storage.iter().map(|n| (&n.uuid, n)).collect();
    let incoming_index: HashMap<&NodeUuid, &SyncNode> = incoming.iter().map(|n| (&n.uuid, n)).collect();

    let mut updated_incoming = HashSet::new();
    let mut updated_in_storage = HashSet::new();
    let mut new_incoming = HashSet::new();
    let mut new_in_storage = HashSet::new();

    for (uuid, theirs) in &incoming_index {
        match storage_index.get(uuid) {
            Some(ours) if theirs.date_modified > ours.date_modified => {
                updated_incoming.insert(*uuid);
            }
            Some(ours) if theirs.date_modified < ours.date_modified => {
                updated_in_storage.insert(*uuid);
            }
            Some(_) => {}
            None => {
                new_incoming.insert(*uuid);
            }
        }
    }
    for uuid in storage_index.keys() {
        if !incoming_index.contains_key(uuid) {
            new_in_storage.insert(*uuid);
        }
    }

    let predates = |n: &SyncNode| n.date_modified < last_sync;

    let (push_set, pull_set, delete_set, delete_in_storage_set) = match direction {
        SyncDirection::Bidirectional => {
            let delete: HashSet<&NodeUuid> = new_in_storage
                .iter()
                .copied()
                .filter(|u| predates(storage_index[u]))
                .collect();
            let delete_in_storage: HashSet<&NodeUuid> = new_incoming
                .iter()
                .copied()
                .filter(|u| predates(incoming_index[u]))
                .collect();
            let push: HashSet<&NodeUuid> = new_incoming
                .difference(&delete_in_storage)
                .chain(updated_incoming.iter())
                .copied()
                .collect();
            let pull: HashSet<&NodeUuid> = new_in_storage
                .difference(&delete)
                .chain(updated_in_storage.iter())
                .copied()
                .collect();
            (push, pull, delete, delete_in_storage)
        }
        SyncDirection::PullOnly => {
            let pull: HashSet<&NodeUuid> = new_in_storage.union(&updated_in_storage).copied().collect();
            (HashSet::new(), pull, new_incoming.clone(), HashSet::new())
        }
    };

    let flagged = |side: &[SyncNode], members: &HashSet<&NodeUuid>, new: &HashSet<&NodeUuid>, pushing: bool| {
        deduplicated_tree_order(side)
            .into_iter()
            .filter(|n| members.contains(&n.uuid))
            .map(|n| {
                let mut node = n.clone().without_flags();
                let transfer = n.content_changed(new.contains(&n.uuid), last_sync);
                if pushing {
                    node.push_content = Some(transfer);
                } else {
                    node.pull_content = Some(transfer);
                }
                node
            })
            .collect::<Vec<_>>()
    };
    let bare = |side: &[SyncNode], members: &HashSet<&NodeUuid>| {
        deduplicated_tree_order(side)
            .into_iter()
            .filter(|n| members.contains(&n.uuid))
            .map(|n| n.clone().without_flags())
            .collect::<Vec<_>>()
    };

    SyncPlan {
        push: flagged(incoming, &push_set, &new_incoming, true),
        pull: flagged(storage, &pull_set, &new_in_storage, false),
        delete: match direction {
            SyncDirection::Bidirectional => bare(storage, &delete_set),
            SyncDirection::PullOnly => bare(incoming, &delete_set),
        },
        delete_in_storage: bare(incoming, &delete_in_storage_set),
    }
}

/// Parents-first order with repeated uuids collapsed to their last
/// occurrence, matching how the index maps were built.
fn deduplicated_tree_order(side: &[SyncNode]) -> Vec<&SyncNode> {
    let mut last: HashMap<&NodeUuid, usize> = HashMap::new();
    for (i, n) in side.iter().enumerate() {
        last.insert(&n.uuid, i);
    }
    let unique = side.iter().enumerate().filter(|(i, n)| last[&n.uuid] == *i).map(|(_, n)| n);
    tree_sort(unique)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid(s: &str) -> NodeUuid {
        NodeUuid::new(s).unwrap()
    }

    fn sync(id: &str, parent: Option<&str>, modified: i64) -> SyncNode {
        let mut n = SyncNode::new(uuid(id), modified);
        n.parent = parent.map(uuid);
        n
    }

    fn with_content(mut n: SyncNode, content: i64) -> SyncNode {
        n.content_modified = Some(content);
        n
    }

    fn ids(nodes: &[SyncNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.uuid.as_str()).collect()
    }

    #[test]
    fn classification_table() {
        let storage = vec![sync("A", None, 100), sync("B", None, 10)];
        let incoming = vec![sync("A", None, 200), sync("C", None, 60)];
        let plan = classify(SyncDirection::Bidirectional, &storage, &incoming, 50);

        let mut push = ids(&plan.push);
        push.sort();
        assert_eq!(push, vec!["A", "C"]);
        assert_eq!(ids(&plan.delete), vec!["B"]);
        assert!(plan.pull.is_empty());
        assert!(plan.delete_in_storage.is_empty());
    }

    #[test]
    fn equal_timestamps_need_nothing() {
        let nodes = vec![sync("A", None, 100)];
        let plan = classify(SyncDirection::Bidirectional, &nodes, &nodes, 50);
        assert!(plan.is_empty());
    }

    #[test]
    fn storage_newer_is_pulled() {
        let storage = vec![sync("A", None, 300)];
        let incoming = vec![sync("A", None, 200)];
        let plan = classify(SyncDirection::Bidirectional, &storage, &incoming, 50);
        assert_eq!(ids(&plan.pull), vec!["A"]);
        assert!(plan.push.is_empty());
    }

    #[test]
    fn old_incoming_only_is_deleted_in_storage() {
        let incoming = vec![sync("D", None, 20), sync("E", None, 80)];
        let plan = classify(SyncDirection::Bidirectional, &[], &incoming, 50);
        assert_eq!(ids(&plan.delete_in_storage), vec!["D"]);
        assert_eq!(ids(&plan.push), vec!["E"]);
    }

    #[test]
    fn new_storage_only_is_pulled_not_deleted() {
        let storage = vec![sync("F", None, 70)];
        let plan = classify(SyncDirection::Bidirectional, &storage, &[], 50);
        assert_eq!(ids(&plan.pull), vec!["F"]);
        assert!(plan.delete.is_empty());
    }

    #[test]
    fn pull_is_parents_first() {
        let storage = vec![
            sync("leaf", Some("group"), 90),
            sync("group", Some("shelf"), 90),
            sync("shelf", None, 90),
            sync("other", Some("shelf"), 10),
        ];
        let incoming = vec![sync("other", Some("shelf"), 10)];
        let plan = classify(SyncDirection::Bidirectional, &storage, &incoming, 50);
        assert_eq!(ids(&plan.pull), vec!["shelf", "group", "leaf"]);
    }

    #[test]
    fn content_flags() {
        let storage = vec![
            with_content(sync("new", None, 90), 10),
            with_content(sync("old-content", None, 300), 40),
            with_content(sync("fresh-content", None, 300), 80),
            sync("no-content", None, 300),
        ];
        let incoming = vec![
            sync("old-content", None, 200),
            sync("fresh-content", None, 200),
            sync("no-content", None, 200),
        ];
        let plan = classify(SyncDirection::Bidirectional, &storage, &incoming, 50);
        let flag = |id: &str| {
            plan.pull
                .iter()
                .find(|n| n.uuid.as_str() == id)
                .and_then(|n| n.pull_content)
                .unwrap()
        };
        assert!(flag("new"));
        assert!(!flag("old-content"));
        assert!(flag("fresh-content"));
        assert!(!flag("no-content"));
        assert!(plan.pull.iter().all(|n| n.push_content.is_none()));
    }

    #[test]
    fn push_content_flag() {
        let incoming = vec![with_content(sync("C", None, 60), 55)];
        let plan = classify(SyncDirection::Bidirectional, &[], &incoming, 50);
        assert_eq!(plan.push[0].push_content, Some(true));
        assert!(plan.push[0].pull_content.is_none());
    }

    #[test]
    fn delete_lists_carry_no_flags() {
        let storage = vec![with_content(sync("B", None, 10), 5)];
        let plan = classify(SyncDirection::Bidirectional, &storage, &[], 50);
        assert_eq!(plan.delete[0], with_content(sync("B", None, 10), 5));
    }

    #[test]
    fn pull_only_keeps_storage_canonical() {
        let storage = vec![sync("A", None, 100), sync("B", None, 10)];
        let incoming = vec![sync("A", None, 200), sync("C", None, 60), sync("D", None, 20)];
        let plan = classify(SyncDirection::PullOnly, &storage, &incoming, 50);

        assert!(plan.push.is_empty());
        assert!(plan.delete_in_storage.is_empty());
        assert_eq!(ids(&plan.pull), vec!["B"]);
        let mut delete = ids(&plan.delete);
        delete.sort();
        assert_eq!(delete, vec!["C", "D"]);
    }

    #[test]
    fn duplicate_incoming_uuid_counted_once() {
        let incoming = vec![sync("C", None, 60), sync("C", None, 70)];
        let plan = classify(SyncDirection::Bidirectional, &[], &incoming, 50);
        assert_eq!(plan.push.len(), 1);
        assert_eq!(plan.push[0].date_modified, 70);
    }

    #[test]
    fn plan_wire_shape() {
        let plan = classify(SyncDirection::Bidirectional, &[sync("B", None, 10)], &[], 50);
        let value = serde_json::to_value(&plan).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "push": [],
                "pull": [],
                "delete": [{"uuid": "B", "date_modified": 10}],
                "delete_in_storage": []
            })
        );
    }
}

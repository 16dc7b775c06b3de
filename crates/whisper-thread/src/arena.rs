use std::collections::{HashMap, VecDeque};

use tracing::debug;

use whisper_types::models::{Reply, ThreadedReply};

/// The replies of one message, stored flat, with parent/child links held as
/// indices into the arena.
///
/// Parent resolution: a `parent_id` that is missing from the set, points at
/// the reply itself, or lies on a parent cycle leaves the reply at the root.
/// Every walk uses an explicit stack or queue, so input chain length is not
/// bounded by the call stack.
pub struct ReplyThread {
    replies: Vec<Reply>,
    index: HashMap<i64, usize>,
    children: Vec<Vec<usize>>,
    levels: Vec<u32>,
    roots: Vec<usize>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unseen,
    OnPath,
    Done,
}

impl ReplyThread {
    pub fn build<I>(replies: I, max_level: u32) -> Self
    where
        I: IntoIterator<Item = Reply>,
    {
        // A repeated id overwrites the earlier record in place.
        let mut arena: Vec<Reply> = Vec::new();
        let mut index: HashMap<i64, usize> = HashMap::new();
        for reply in replies {
            match index.get(&reply.id) {
                Some(&slot) => arena[slot] = reply,
                None => {
                    index.insert(reply.id, arena.len());
                    arena.push(reply);
                }
            }
        }

        let mut parents: Vec<Option<usize>> = arena
            .iter()
            .enumerate()
            .map(|(slot, reply)| {
                reply
                    .parent_id
                    .and_then(|pid| index.get(&pid).copied())
                    .filter(|&parent| parent != slot)
            })
            .collect();

        let orphans = arena
            .iter()
            .zip(&parents)
            .filter(|(reply, parent)| reply.parent_id.is_some() && parent.is_none())
            .count();
        let cyclic = break_cycles(&mut parents);
        if orphans > 0 || cyclic > 0 {
            debug!(orphans, cyclic, "Unresolved reply parents placed at thread root");
        }

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); arena.len()];
        let mut roots = Vec::new();
        for (slot, parent) in parents.iter().enumerate() {
            match parent {
                Some(p) => children[*p].push(slot),
                None => roots.push(slot),
            }
        }

        let by_time = |a: &usize, b: &usize| {
            let (a, b) = (&arena[*a], &arena[*b]);
            a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))
        };
        roots.sort_by(by_time);
        for siblings in &mut children {
            siblings.sort_by(by_time);
        }

        let mut levels = vec![0u32; arena.len()];
        let mut queue: VecDeque<usize> = roots.iter().copied().collect();
        while let Some(slot) = queue.pop_front() {
            let child_level = levels[slot].saturating_add(1).min(max_level);
            for &child in &children[slot] {
                levels[child] = child_level;
                queue.push_back(child);
            }
        }

        Self {
            replies: arena,
            index,
            children,
            levels,
            roots,
        }
    }

    /// Number of distinct replies in the thread.
    pub fn len(&self) -> usize {
        self.replies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
    }

    /// Root reply ids in display order.
    pub fn root_ids(&self) -> Vec<i64> {
        self.roots.iter().map(|&slot| self.replies[slot].id).collect()
    }

    pub fn level_of(&self, reply_id: i64) -> Option<u32> {
        self.index.get(&reply_id).map(|&slot| self.levels[slot])
    }

    /// Ids of the direct replies to `reply_id`, in display order.
    pub fn child_ids(&self, reply_id: i64) -> Vec<i64> {
        self.index
            .get(&reply_id)
            .map(|&slot| {
                self.children[slot]
                    .iter()
                    .map(|&child| self.replies[child].id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The reply and all of its descendants, parents before children.
    /// Empty when `reply_id` is not part of the thread.
    pub fn subtree_ids(&self, reply_id: i64) -> Vec<i64> {
        let Some(&start) = self.index.get(&reply_id) else {
            return Vec::new();
        };

        let mut ids = Vec::new();
        let mut stack = vec![start];
        while let Some(slot) = stack.pop() {
            ids.push(self.replies[slot].id);
            stack.extend(self.children[slot].iter().rev());
        }
        ids
    }

    /// Consume the arena into the nested display view.
    pub fn into_tree(self) -> Vec<ThreadedReply> {
        // Pre-order puts every parent ahead of its children, so building in
        // reverse finds each child already assembled.
        let mut order = Vec::with_capacity(self.replies.len());
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(slot) = stack.pop() {
            order.push(slot);
            stack.extend(self.children[slot].iter().rev());
        }

        let mut pending: Vec<Option<Reply>> = self.replies.into_iter().map(Some).collect();
        let mut built: Vec<Option<ThreadedReply>> = vec![None; pending.len()];
        for &slot in order.iter().rev() {
            let Some(reply) = pending[slot].take() else {
                continue;
            };
            let children = self.children[slot]
                .iter()
                .filter_map(|&child| built[child].take())
                .collect();
            built[slot] = Some(ThreadedReply {
                reply,
                level: self.levels[slot],
                children,
            });
        }

        self.roots
            .iter()
            .filter_map(|&slot| built[slot].take())
            .collect()
    }
}

/// Detach every reply that sits on a parent cycle. Returns how many were
/// detached. Each reply has at most one parent, so a walk up from any reply
/// either reaches a root, reaches an already-classified reply, or loops back
/// onto its own path.
fn break_cycles(parents: &mut [Option<usize>]) -> usize {
    let mut state = vec![Visit::Unseen; parents.len()];
    let mut detached = 0;

    for start in 0..parents.len() {
        if state[start] != Visit::Unseen {
            continue;
        }

        let mut path = Vec::new();
        let mut cursor = Some(start);
        while let Some(slot) = cursor {
            match state[slot] {
                Visit::Unseen => {
                    state[slot] = Visit::OnPath;
                    path.push(slot);
                    cursor = parents[slot];
                }
                Visit::OnPath => {
                    if let Some(pos) = path.iter().position(|&p| p == slot) {
                        for &member in &path[pos..] {
                            parents[member] = None;
                            detached += 1;
                        }
                    }
                    break;
                }
                Visit::Done => break,
            }
        }

        for slot in path {
            state[slot] = Visit::Done;
        }
    }

    detached
}

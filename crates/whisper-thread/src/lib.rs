//! Reply threading: turns the flat reply list of a message into the nested,
//! chronologically ordered view shown under the message.

pub mod arena;

pub use arena::ReplyThread;

use whisper_types::api::ThreadPreview;
use whisper_types::models::{Reply, ThreadedReply};

/// Deepest indent level a reply is rendered at. Deeper replies keep their
/// place in the tree but share this level.
pub const DEFAULT_MAX_NESTING_LEVEL: u32 = 3;

/// Enforced by the API before insertion, not by the builder.
pub const MAX_REPLIES_PER_MESSAGE: usize = 500;

/// Maximum reply length in characters.
pub const MAX_REPLY_LENGTH: usize = 500;

/// Root threads shown in a collapsed thread.
pub const PREVIEW_ROOT_THREADS: usize = 2;

/// Build the display tree for one message's replies.
pub fn build_thread<I>(replies: I, max_level: u32) -> Vec<ThreadedReply>
where
    I: IntoIterator<Item = Reply>,
{
    ReplyThread::build(replies, max_level).into_tree()
}

/// Ids removed by a cascading delete of `reply_id`: the reply itself and
/// every descendant. Empty when the reply is not in `replies`.
pub fn subtree_ids<I>(replies: I, reply_id: i64) -> Vec<i64>
where
    I: IntoIterator<Item = Reply>,
{
    ReplyThread::build(replies, DEFAULT_MAX_NESTING_LEVEL).subtree_ids(reply_id)
}

/// Total replies in a built tree.
pub fn count_nodes(threads: &[ThreadedReply]) -> usize {
    let mut count = 0;
    let mut stack: Vec<&ThreadedReply> = threads.iter().collect();
    while let Some(node) = stack.pop() {
        count += 1;
        stack.extend(node.children.iter());
    }
    count
}

/// Keep the first `limit` root threads and report how many were hidden.
pub fn preview(mut threads: Vec<ThreadedReply>, limit: usize) -> ThreadPreview {
    let hidden_count = threads.len().saturating_sub(limit);
    threads.truncate(limit);
    ThreadPreview {
        threads,
        hidden_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use whisper_types::models::AuthorRef;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    fn reply(id: i64, parent_id: Option<i64>, secs: i64) -> Reply {
        Reply {
            id,
            message_id: 1,
            parent_id,
            content: format!("reply {}", id),
            author: AuthorRef::Anonymous,
            nickname: "ghost".into(),
            created_at: at(secs),
        }
    }

    fn ids(nodes: &[ThreadedReply]) -> Vec<i64> {
        nodes.iter().map(|n| n.reply.id).collect()
    }

    fn find(nodes: &[ThreadedReply], id: i64) -> Option<&ThreadedReply> {
        let mut stack: Vec<&ThreadedReply> = nodes.iter().collect();
        while let Some(node) = stack.pop() {
            if node.reply.id == id {
                return Some(node);
            }
            stack.extend(node.children.iter());
        }
        None
    }

    #[test]
    fn builds_nested_thread_in_order() {
        let replies = vec![
            reply(4, Some(2), 3),
            reply(3, None, 2),
            reply(2, Some(1), 1),
            reply(1, None, 0),
        ];
        let tree = build_thread(replies, DEFAULT_MAX_NESTING_LEVEL);

        assert_eq!(ids(&tree), vec![1, 3]);
        assert_eq!(ids(&tree[0].children), vec![2]);
        assert_eq!(ids(&tree[0].children[0].children), vec![4]);
        assert_eq!(tree[0].children[0].children[0].level, 2);
        assert_eq!(tree[1].level, 0);
        assert!(tree[1].children.is_empty());
    }

    #[test]
    fn keeps_every_reply() {
        let replies: Vec<Reply> = (1..=40)
            .map(|id| {
                let parent = if id % 3 == 0 { None } else { Some(id / 2) };
                reply(id, parent, 40 - id)
            })
            .collect();
        let tree = build_thread(replies, DEFAULT_MAX_NESTING_LEVEL);
        assert_eq!(count_nodes(&tree), 40);
    }

    #[test]
    fn empty_input_gives_empty_thread() {
        assert!(build_thread(Vec::new(), DEFAULT_MAX_NESTING_LEVEL).is_empty());
        assert!(subtree_ids(Vec::new(), 1).is_empty());
    }

    #[test]
    fn orphan_becomes_root() {
        let replies = vec![reply(1, None, 0), reply(2, Some(99), 1)];
        let tree = build_thread(replies, DEFAULT_MAX_NESTING_LEVEL);
        assert_eq!(ids(&tree), vec![1, 2]);
        assert_eq!(tree[1].level, 0);
        // The declared parent is still reported as-is.
        assert_eq!(tree[1].reply.parent_id, Some(99));
    }

    #[test]
    fn depth_is_capped_but_structure_kept() {
        let replies: Vec<Reply> = (1..=8)
            .map(|id| reply(id, if id == 1 { None } else { Some(id - 1) }, id))
            .collect();
        let thread = ReplyThread::build(replies, 3);

        assert_eq!(thread.level_of(1), Some(0));
        assert_eq!(thread.level_of(3), Some(2));
        assert_eq!(thread.level_of(4), Some(3));
        assert_eq!(thread.level_of(8), Some(3));
        assert_eq!(thread.child_ids(7), vec![8]);

        let tree = thread.into_tree();
        let mut node = &tree[0];
        let mut depth = 1;
        while let Some(child) = node.children.first() {
            assert!(child.level <= 3);
            node = child;
            depth += 1;
        }
        assert_eq!(depth, 8);
    }

    #[test]
    fn siblings_sorted_by_time() {
        let replies = vec![
            reply(1, None, 0),
            reply(5, Some(1), 9),
            reply(6, Some(1), 2),
            reply(7, Some(1), 5),
            reply(8, None, -10),
        ];
        let tree = build_thread(replies, DEFAULT_MAX_NESTING_LEVEL);
        assert_eq!(ids(&tree), vec![8, 1]);
        assert_eq!(ids(&tree[1].children), vec![6, 7, 5]);
    }

    #[test]
    fn same_timestamp_falls_back_to_id() {
        let replies = vec![reply(3, None, 0), reply(2, None, 0), reply(1, None, 0)];
        let tree = build_thread(replies, DEFAULT_MAX_NESTING_LEVEL);
        assert_eq!(ids(&tree), vec![1, 2, 3]);
    }

    #[test]
    fn duplicate_id_keeps_last_record() {
        let mut later = reply(2, Some(1), 1);
        later.content = "edited".into();
        let replies = vec![reply(1, None, 0), reply(2, None, 1), later];

        let tree = build_thread(replies, DEFAULT_MAX_NESTING_LEVEL);
        assert_eq!(count_nodes(&tree), 2);
        assert_eq!(ids(&tree), vec![1]);
        assert_eq!(tree[0].children[0].reply.content, "edited");
    }

    #[test]
    fn cycles_fall_back_to_root() {
        // 1 <-> 2 loop, 3 hangs off 2, 4 points at itself
        let replies = vec![
            reply(1, Some(2), 0),
            reply(2, Some(1), 1),
            reply(3, Some(2), 2),
            reply(4, Some(4), 3),
        ];
        let thread = ReplyThread::build(replies, DEFAULT_MAX_NESTING_LEVEL);
        assert_eq!(thread.root_ids(), vec![1, 2, 4]);
        assert_eq!(thread.child_ids(2), vec![3]);
        assert_eq!(thread.level_of(3), Some(1));

        let tree = thread.into_tree();
        assert_eq!(count_nodes(&tree), 4);
    }

    #[test]
    fn cycle_member_subtree_is_finite() {
        let replies = vec![reply(1, Some(3), 0), reply(2, Some(1), 1), reply(3, Some(2), 2)];
        let mut ids = subtree_ids(replies, 1);
        ids.sort();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn subtree_collects_descendants_only() {
        // A=1 with B=2 (child of A), C=3 (child of B), D=4 (child of A)
        let replies = vec![
            reply(1, None, 0),
            reply(2, Some(1), 1),
            reply(3, Some(2), 2),
            reply(4, Some(1), 3),
            reply(5, None, 4),
            reply(6, Some(5), 5),
        ];
        assert_eq!(subtree_ids(replies.clone(), 1), vec![1, 2, 3, 4]);
        assert_eq!(subtree_ids(replies.clone(), 2), vec![2, 3]);
        assert_eq!(subtree_ids(replies.clone(), 6), vec![6]);
        assert!(subtree_ids(replies, 42).is_empty());
    }

    #[test]
    fn long_chain_does_not_recurse() {
        let replies: Vec<Reply> = (1..=2_000)
            .map(|id| reply(id, if id == 1 { None } else { Some(id - 1) }, id))
            .collect();
        let thread = ReplyThread::build(replies, 5);
        assert_eq!(thread.len(), 2_000);
        assert_eq!(thread.subtree_ids(1).len(), 2_000);
        assert_eq!(thread.level_of(2_000), Some(5));
    }

    #[test]
    fn preview_shows_first_two_threads() {
        let replies: Vec<Reply> = (1..=5).map(|id| reply(id, None, 10 - id)).collect();
        let tree = build_thread(replies, DEFAULT_MAX_NESTING_LEVEL);
        let preview = preview(tree, PREVIEW_ROOT_THREADS);

        assert_eq!(ids(&preview.threads), vec![5, 4]);
        assert_eq!(preview.hidden_count, 3);
    }

    #[test]
    fn preview_of_short_thread_hides_nothing() {
        let tree = build_thread(vec![reply(1, None, 0)], DEFAULT_MAX_NESTING_LEVEL);
        let preview = preview(tree, PREVIEW_ROOT_THREADS);
        assert_eq!(preview.threads.len(), 1);
        assert_eq!(preview.hidden_count, 0);
    }

    #[test]
    fn nested_replies_found_in_tree() {
        let replies = vec![reply(1, None, 0), reply(2, Some(1), 1), reply(3, Some(2), 2)];
        let tree = build_thread(replies, 1);
        let deep = find(&tree, 3).unwrap();
        assert_eq!(deep.level, 1);
    }
}

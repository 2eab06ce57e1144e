// src/services/ledger.rs

//! Counter conventions for comment events.
//!
//! Whatever a creation adds, removing that node takes back exactly.

use crate::models::{
    counter::{CounterField, EntityRef},
    identity::BlogId,
};

/// One signed counter adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delta {
    pub entity: EntityRef,
    pub field: CounterField,
    pub delta: i64,
}

/// Deltas owed when a node is created under `blog_id`.
pub fn on_comment_created(blog_id: BlogId, is_reply: bool) -> Vec<Delta> {
    let blog = EntityRef::Blog(blog_id);
    let mut deltas = vec![Delta {
        entity: blog,
        field: CounterField::TotalComments,
        delta: 1,
    }];
    if !is_reply {
        deltas.push(Delta {
            entity: blog,
            field: CounterField::TotalParentComments,
            delta: 1,
        });
    }
    deltas
}

/// Exact inverse of [`on_comment_created`] for one removed node.
pub fn on_comment_removed(blog_id: BlogId, is_reply: bool) -> Vec<Delta> {
    on_comment_created(blog_id, is_reply)
        .into_iter()
        .map(|d| Delta {
            delta: -d.delta,
            ..d
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_counts_as_parent_comment() {
        let deltas = on_comment_created(7, false);
        assert_eq!(deltas.len(), 2);
        assert!(deltas.iter().all(|d| d.delta == 1 && d.entity == EntityRef::Blog(7)));
    }

    #[test]
    fn reply_only_touches_total_comments() {
        let deltas = on_comment_created(7, true);
        assert_eq!(
            deltas,
            vec![Delta {
                entity: EntityRef::Blog(7),
                field: CounterField::TotalComments,
                delta: 1,
            }]
        );
    }

    #[test]
    fn removal_cancels_creation() {
        for is_reply in [false, true] {
            let created = on_comment_created(3, is_reply);
            let removed = on_comment_removed(3, is_reply);
            assert_eq!(created.len(), removed.len());
            for (c, r) in created.iter().zip(&removed) {
                assert_eq!(c.field, r.field);
                assert_eq!(c.delta + r.delta, 0);
            }
        }
    }
}

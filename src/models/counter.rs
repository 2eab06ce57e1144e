use serde::{Deserialize, Serialize};

use super::identity::{BlogId, UserId};

/// An entity that carries derived counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum EntityRef {
    Blog(BlogId),
    User(UserId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterField {
    TotalComments,
    TotalParentComments,
    TotalPosts,
    TotalReads,
    TotalLikes,
}

impl CounterField {
    /// Column backing this counter on the given entity, if the entity has one.
    pub fn column_for(self, entity: EntityRef) -> Option<&'static str> {
        match (entity, self) {
            (EntityRef::Blog(_), CounterField::TotalComments) => Some("total_comments"),
            (EntityRef::Blog(_), CounterField::TotalParentComments) => {
                Some("total_parent_comments")
            }
            (EntityRef::Blog(_), CounterField::TotalReads) => Some("total_reads"),
            (EntityRef::Blog(_), CounterField::TotalLikes) => Some("total_likes"),
            (EntityRef::User(_), CounterField::TotalPosts) => Some("total_posts"),
            (EntityRef::User(_), CounterField::TotalReads) => Some("total_reads"),
            _ => None,
        }
    }
}

impl std::fmt::Display for CounterField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CounterField::TotalComments => "total_comments",
            CounterField::TotalParentComments => "total_parent_comments",
            CounterField::TotalPosts => "total_posts",
            CounterField::TotalReads => "total_reads",
            CounterField::TotalLikes => "total_likes",
        };
        f.write_str(name)
    }
}

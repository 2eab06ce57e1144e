// src/models/identity.rs

//! Opaque identifiers shared across the comment subsystem.
//! They only support equality and lookup; the owning stores give them meaning.

pub type UserId = i64;
pub type BlogId = i64;
pub type CommentId = i64;
pub type NotificationId = i64;

// src/models/mod.rs

pub mod comment;
pub mod counter;
pub mod directory;
pub mod identity;
pub mod notification;
pub mod outbox;

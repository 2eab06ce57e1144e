// src/services/mod.rs

pub mod comments;
pub mod engagement;
pub mod fanout;
pub mod follow_up;
pub mod ledger;
pub mod tree;

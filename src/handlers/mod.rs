// src/handlers/mod.rs

pub mod comment;
pub mod interaction;
pub mod notification;

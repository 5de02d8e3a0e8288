//! TutorLink Message Store Client
//!
//! This crate talks to the message store's REST API for the parts of chat
//! that are not realtime: history pages, unread counts, and archive state.

pub mod client;
pub mod error;

pub use client::{MarkedCount, MessagePage, StoreClient, UnreadCount};
pub use error::{StoreError, StoreResult};

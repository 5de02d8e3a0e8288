//! TutorLink Shared Chat Types
//!
//! This crate contains the identifier newtypes and chat domain types shared
//! between the realtime client and the Message Store client.

pub mod clock;
pub mod ids;
pub mod types;

pub use clock::*;
pub use ids::*;
pub use types::*;

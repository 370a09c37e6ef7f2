//! Mail → ticket bridge: turns mailbox messages into issue-tracker tickets
//! and follow-up messages into comments, exactly once per message.

pub mod config;
pub mod error;
pub mod mailbox;
pub mod scheduler;
pub mod sync;
pub mod tracker;

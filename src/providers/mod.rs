//! External service capabilities.
//!
//! - [`email`] - Hosted mailbox API (Gmail REST)
//! - [`web`] - Outbound unsubscribe requests and the OS URL opener

pub mod email;
pub mod web;

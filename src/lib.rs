//! mailsweep - Bulk mailbox cleanup over the Gmail API
//!
//! This crate provides the cleanup pipelines behind the `mailsweep` command:
//! newsletter unsubscribe-and-delete, automated-notification deduplication,
//! archiving, labeling and a mailbox overview scan.

pub mod config;
pub mod domain;
pub mod providers;
pub mod services;
pub mod storage;

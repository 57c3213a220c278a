//! Low-inventory notification worker.
//!
//! Drains the `email_queue` table on a fixed interval and emails each
//! supplier whose item has dropped below its stock threshold.

pub mod email;
pub mod store;
pub mod template;
pub mod worker;

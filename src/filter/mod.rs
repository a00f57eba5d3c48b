//! DNS query filtering module.
//!
//! Decides which queries are let through to the upstream resolver and which
//! are answered by the portal itself.

mod whitelist;

pub use whitelist::Whitelist;

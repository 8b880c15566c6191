//! Session identity shared across the whole run.

pub mod session;

pub use session::SessionIdentity;

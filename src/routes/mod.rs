//! Router Module Index
//!
//! Routes are grouped by the middleware tier they need. `lib.rs` wraps each
//! group in its tier's layers, so a route's access rules follow from the module
//! it is declared in.

/// Routes that need no session at all (health checks).
pub mod public;

/// Routes reachable anonymously but with session, CSRF and auth context loaded.
pub mod dynamic;

/// Routes that additionally require an authenticated user.
pub mod protected;

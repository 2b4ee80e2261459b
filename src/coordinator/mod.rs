//! Session coordination
//!
//! [`SessionCoordinator`] is shared (`Arc`) between the HTTP handlers, the
//! status listener, the discovery reconciler and the liveness reaper.
//!
//! ```text
//!                     Arc<SessionCoordinator>
//!               ┌──────────────────────────────┐
//!               │ Mutex {                      │
//!               │   devices:   usn -> state    │
//!               │   sessions:  id  -> record   │
//!               │   endpoints: id  -> resource │
//!               │ }                            │
//!               └──────┬─────────────┬─────────┘
//!                      │             │
//!          create/stop │             │ status:<id>
//!              GET/HEAD│             │
//!                 [HTTP server]  [status listener]
//!                      │
//!                      ▼ start/read/destroy (unlocked)
//!                 [MediaEngine]
//! ```

pub mod config;
pub mod error;
pub mod lifecycle;

pub use config::CoordinatorConfig;
pub use error::SessionError;
pub use lifecycle::SessionCoordinator;

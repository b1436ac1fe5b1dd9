//! Common infrastructure shared by the front end and the forms.
//!
//! # Modules
//!
//! - [`security`] - Sanitization, injection heuristics, rate limiting, audit logging
//! - [`storage`] - Namespaced key-value persistence with a sensitive-key guard
//! - [`config`] - Security configuration and defaults
//! - [`clock`] - Injectable time source
//! - [`guard_server`] - Line-delimited JSON front end
//!
//! # Architecture
//!
//! ```text
//! Security
//!   ├── FormValidator ── Sanitizer ── PatternDetector
//!   ├── RateLimiter (Arc<dyn Clock>)
//!   ├── AuditLog    (Arc<dyn Clock>, shared by every stage)
//!   └── SecureStorage ── StorageBackend
//! ```

pub mod clock;
pub mod config;
pub mod guard_server;
pub mod security;
pub mod storage;

//! Request guard library for the web-resume site.
//!
//! `resume-guard` holds the framework-agnostic pieces of the request
//! middleware so the HTTP server (`resume-web`) stays a thin adapter.
//!
//! # Modules
//!
//! - [`settings`] — Rate limiter configuration ([`RateLimitSettings`]).
//! - [`store`] — Expiring counters: the [`CounterStore`] trait and [`MemoryStore`].
//! - [`client_ip`] — Client address resolution from proxy headers.
//! - [`limiter`] — The per-request pipeline ([`RateLimiter`]).
//! - [`access`] — Access log records and user-agent classification.
//! - [`error`] — Unified error type ([`GuardError`]) and result alias ([`GuardResult`]).

pub mod access;
pub mod client_ip;
pub mod error;
pub mod limiter;
pub mod settings;
pub mod store;

pub use access::{should_log, AccessRecord, DeviceInfo, Visitor};
pub use client_ip::{log_client_ip, resolve_client_ip, UNKNOWN_CLIENT};
pub use error::{GuardError, GuardResult};
pub use limiter::{Decision, RateLimited, RateLimiter, RequestInfo, Scope, Verdict};
pub use settings::{Locale, RateLimitSettings, WindowMode};
pub use store::{CounterOutcome, CounterStore, MemoryStore};

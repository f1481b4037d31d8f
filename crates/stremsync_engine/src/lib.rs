//! # Stremsync Engine
//!
//! Reconciliation engine and device-auth flow for Stremsync.
//!
//! This crate provides:
//! - Desired-state resolution (group order + per-user overrides)
//! - Desired-vs-actual diffing into an ordered operation plan
//! - Plan execution with per-user locking and retry with backoff
//! - Device-code authorization polling state machine
//! - Credential session storage and auth-state broadcasting
//! - HTTP account-API abstraction
//!
//! ## Architecture
//!
//! Syncing is **declarative**: the directory holds the desired collection,
//! the remote account holds the actual one, and every sync run converges
//! actual toward desired:
//! 1. Resolve the user's desired list from the group plus their overrides
//! 2. Snapshot the remote collection (never cached across runs)
//! 3. Diff into a plan, classified no-op / safe / destructive
//! 4. Apply the plan as one whole-collection replace
//!
//! ## Key Invariants
//!
//! - Plans are deterministic and idempotent
//! - Protected addons are never removed, excluded addons never added
//! - Full wipes require explicit confirmation
//! - At most one sync per user in flight; different users run in parallel
//! - Device codes are single-use with a hard wall-clock deadline

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![allow(async_fn_in_trait)]

mod client;
mod config;
mod device_flow;
mod error;
mod executor;
mod reconcile;
mod resolver;
mod service;
mod session;

pub use client::{
    AccountApi, DeviceCode, DeviceCodeStatus, HttpAccountClient, HttpClient, HttpResponse,
    MockAccountApi,
};
pub use config::{EngineConfig, RetryConfig};
pub use device_flow::{DeviceAuthFlow, DeviceAuthSession, FlowEvents, FlowState};
pub use error::{EngineError, EngineResult};
pub use executor::SyncExecutor;
pub use reconcile::{Classification, Operation, Plan, Reconciler};
pub use resolver::{DesiredStateResolver, DirectorySource, MemoryDirectory};
pub use service::{PreparedSync, SyncService};
pub use session::{AuthState, AuthStateBus, MemorySessionStore, Session, SessionManager, SessionStore};

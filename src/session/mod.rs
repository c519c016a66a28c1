// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session and conversation history management.
//!
//! This module holds everything that makes a conversation multi-turn:
//! the durable session record, the store trait with its in-memory
//! implementation, the budget-aware history trimmer, the manager that
//! runs a full turn, and the background sweeper that evicts idle
//! sessions.

pub mod manager;
pub mod store;
pub mod sweeper;
pub mod trim;
pub mod types;

pub use manager::SessionManager;
pub use store::{MemoryStore, SessionStore, SharedStore};
pub use sweeper::{sweep_once, EvictionSweeper, SweeperHandle};
pub use trim::{trim_history, TokenCounter, TrimOutcome, TrimWarning};
pub use types::{SessionConfig, SessionId, SessionInfo, SessionRecord};

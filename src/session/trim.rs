// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! History trimming against a provider token budget.
//!
//! The trimmer produces the longest suffix of history (plus the new message)
//! that fits the budget. Counting is delegated to the provider and may be a
//! network call; counting failures degrade to a warning rather than an
//! error, trading precision for availability. Callers that need strict
//! correctness check the provider's usage metadata on the response instead.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::ChatMessage;

/// Token-counting seam used by the trimmer.
///
/// Implemented by binding a [`crate::types::ChatProvider`] to a resolved
/// model; tests substitute deterministic stubs.
#[async_trait]
pub trait TokenCounter: Send + Sync {
    async fn count(&self, messages: &[ChatMessage]) -> Result<u32, ProviderError>;
}

/// Non-fatal conditions observed while trimming.
#[derive(Debug)]
pub enum TrimWarning {
    /// The new message alone exceeds the budget. The operation proceeds;
    /// some providers truncate internally.
    BudgetExceeded { tokens: u32, budget: u32 },
    /// Token counting failed mid-trim; the best-known pre-failure candidate
    /// was returned.
    CountFailed(ProviderError),
}

/// Result of one trim pass.
#[derive(Debug)]
pub struct TrimOutcome {
    /// The retained messages, always ending in the new message.
    pub messages: Vec<ChatMessage>,
    /// How many history entries were dropped from the front.
    pub dropped: usize,
    /// Non-fatal condition, if any.
    pub warning: Option<TrimWarning>,
}

/// Trim `history` plus `new_message` to fit `budget` tokens.
///
/// Removal is oldest-first only and the new message is never removed, so the
/// result is a suffix of `history ++ [new_message]` of length >= 1 with
/// relative order preserved. Each removal re-invokes the counter, giving
/// O(n) counting calls worst case; acceptable because every turn trims back
/// to budget before the next is appended, so history length stays bounded by
/// the budget itself.
pub async fn trim_history(
    history: Vec<ChatMessage>,
    new_message: ChatMessage,
    budget: u32,
    counter: &dyn TokenCounter,
) -> TrimOutcome {
    let mut candidate = history;
    candidate.push(new_message);
    let mut dropped = 0;

    loop {
        let tokens = match counter.count(&candidate).await {
            Ok(tokens) => tokens,
            Err(err) => {
                tracing::warn!(error = %err, dropped, "token counting failed mid-trim");
                return TrimOutcome {
                    messages: candidate,
                    dropped,
                    warning: Some(TrimWarning::CountFailed(err)),
                };
            }
        };

        if tokens <= budget {
            return TrimOutcome {
                messages: candidate,
                dropped,
                warning: None,
            };
        }

        if candidate.len() == 1 {
            tracing::warn!(tokens, budget, "single message exceeds token budget");
            return TrimOutcome {
                messages: candidate,
                dropped,
                warning: Some(TrimWarning::BudgetExceeded { tokens, budget }),
            };
        }

        candidate.remove(0);
        dropped += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Counts a fixed cost per history message and a different cost for the
    /// final (new) message, tracking how many times it was invoked.
    struct FixedCostCounter {
        per_message: u32,
        new_message: u32,
        calls: AtomicU32,
        fail_on_call: Option<u32>,
    }

    impl FixedCostCounter {
        fn new(per_message: u32, new_message: u32) -> Self {
            Self {
                per_message,
                new_message,
                calls: AtomicU32::new(0),
                fail_on_call: None,
            }
        }

        fn failing_on(mut self, call: u32) -> Self {
            self.fail_on_call = Some(call);
            self
        }
    }

    #[async_trait]
    impl TokenCounter for FixedCostCounter {
        async fn count(&self, messages: &[ChatMessage]) -> Result<u32, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if Some(call) == self.fail_on_call {
                return Err(ProviderError::Unavailable("count endpoint down".into()));
            }
            let history = (messages.len() as u32 - 1) * self.per_message;
            Ok(history + self.new_message)
        }
    }

    fn turns(n: usize) -> Vec<ChatMessage> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user(format!("question {i}"))
                } else {
                    ChatMessage::assistant(format!("answer {i}"))
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_no_trim_when_under_budget() {
        let counter = FixedCostCounter::new(10, 10);
        let outcome = trim_history(turns(4), ChatMessage::user("new"), 100, &counter).await;

        assert_eq!(outcome.messages.len(), 5);
        assert_eq!(outcome.dropped, 0);
        assert!(outcome.warning.is_none());
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drops_oldest_until_budget_fits() {
        // 5 prior turns at 30 tokens each, new message at 20: full count 170
        // against a budget of 100. Only 2 history turns can remain
        // (2 * 30 + 20 = 80), so exactly 3 are dropped.
        let counter = FixedCostCounter::new(30, 20);
        let outcome = trim_history(turns(5), ChatMessage::user("new"), 100, &counter).await;

        assert_eq!(outcome.dropped, 3);
        assert_eq!(outcome.messages.len(), 3);
        assert!(outcome.warning.is_none());
        // One count per removal plus the initial and final checks
        assert_eq!(counter.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_new_message_always_survives() {
        let new_message = ChatMessage::user("the new one");
        let counter = FixedCostCounter::new(50, 500);
        let outcome = trim_history(turns(3), new_message.clone(), 100, &counter).await;

        assert_eq!(outcome.messages.len(), 1);
        assert_eq!(outcome.messages[0].as_text(), new_message.as_text());
        assert!(matches!(
            outcome.warning,
            Some(TrimWarning::BudgetExceeded { tokens: 500, budget: 100 })
        ));
    }

    #[tokio::test]
    async fn test_order_preserved_and_suffix_only() {
        let history = turns(6);
        let tail: Vec<String> = history[2..]
            .iter()
            .filter_map(|m| m.as_text().map(str::to_string))
            .collect();

        let counter = FixedCostCounter::new(20, 20);
        let outcome = trim_history(history, ChatMessage::user("new"), 100, &counter).await;

        // 4 history turns + new = 100 tokens, so 2 dropped from the front
        assert_eq!(outcome.dropped, 2);
        let kept: Vec<&str> = outcome.messages[..4]
            .iter()
            .filter_map(|m| m.as_text())
            .collect();
        assert_eq!(kept, tail);
        assert_eq!(outcome.messages.last().unwrap().as_text(), Some("new"));
    }

    #[tokio::test]
    async fn test_count_failure_returns_best_known_candidate() {
        // First count succeeds (over budget, drops one), second fails.
        let counter = FixedCostCounter::new(30, 20).failing_on(2);
        let outcome = trim_history(turns(5), ChatMessage::user("new"), 100, &counter).await;

        // One message was dropped before the failure; the rest survive.
        assert_eq!(outcome.dropped, 1);
        assert_eq!(outcome.messages.len(), 5);
        assert!(matches!(
            outcome.warning,
            Some(TrimWarning::CountFailed(ProviderError::Unavailable(_)))
        ));
    }

    #[tokio::test]
    async fn test_empty_history() {
        let counter = FixedCostCounter::new(30, 20);
        let outcome = trim_history(Vec::new(), ChatMessage::user("new"), 100, &counter).await;

        assert_eq!(outcome.messages.len(), 1);
        assert_eq!(outcome.dropped, 0);
        assert!(outcome.warning.is_none());
    }
}

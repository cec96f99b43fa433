//! Waiting for the next interaction on a message.
//!
//! A handler that sent a message with buttons can suspend until someone
//! clicks one of them:
//!
//! ```rust,ignore
//! let next = ctx
//!     .wait_for_interaction(vec![author], Duration::from_secs(10), |ctx: InteractionContext| async move {
//!         Ack::update(format!("You picked {}", ctx.custom_id().unwrap_or_default()))
//!     })
//!     .await;
//! ```
//!
//! The waiter is keyed by message id in a [`WaiterRegistry`] shared by the
//! dispatcher. The dispatcher offers every component interaction that
//! references a message to the registry before the component routes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hookline_core::Snowflake;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::context::InteractionContext;
use crate::error::HandlerResult;
use crate::handler::{Ack, BoxedComponentHandler};

/// Ephemeral reply sent to users outside a waiter's allow list.
pub const NOT_ALLOWED_MESSAGE: &str = "You are not allowed to interact with this message";

type Gate = oneshot::Sender<Option<InteractionContext>>;

/// One registered wait.
struct Waiter {
    allowed: Vec<Snowflake>,
    follow_up: BoxedComponentHandler,
    /// Taken exactly once: by a delivery, a timeout or a replacement.
    gate: Mutex<Option<Gate>>,
}

impl Waiter {
    fn allows(&self, author: Option<Snowflake>) -> bool {
        self.allowed.is_empty() || author.is_some_and(|id| self.allowed.contains(&id))
    }

    /// Resolves the wait with `None` if nothing resolved it yet.
    fn close(&self) -> bool {
        match self.gate.lock().take() {
            Some(gate) => {
                let _ = gate.send(None);
                true
            }
            None => false,
        }
    }
}

/// Process-wide table of pending waits, keyed by message id.
#[derive(Clone, Default)]
pub struct WaiterRegistry {
    waiters: Arc<Mutex<HashMap<Snowflake, Arc<Waiter>>>>,
}

/// Removes the entry when the wait ends, however it ends.
struct Registration<'a> {
    registry: &'a WaiterRegistry,
    message_id: Snowflake,
    waiter: Arc<Waiter>,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.registry.remove(self.message_id, &self.waiter);
    }
}

impl WaiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the next allowed interaction on `message_id`.
    ///
    /// An empty `allowed` list lets anyone through. Returns the new
    /// interaction's context, or `None` on timeout or when another wait on
    /// the same message replaces this one.
    pub async fn wait<H>(
        &self,
        message_id: Snowflake,
        allowed: Vec<Snowflake>,
        timeout: Duration,
        follow_up: H,
    ) -> Option<InteractionContext>
    where
        H: crate::handler::ComponentHandler,
    {
        self.wait_boxed(message_id, allowed, timeout, Arc::new(follow_up))
            .await
    }

    pub async fn wait_boxed(
        &self,
        message_id: Snowflake,
        allowed: Vec<Snowflake>,
        timeout: Duration,
        follow_up: BoxedComponentHandler,
    ) -> Option<InteractionContext> {
        let (gate, mut rx) = oneshot::channel();
        let waiter = Arc::new(Waiter {
            allowed,
            follow_up,
            gate: Mutex::new(Some(gate)),
        });

        let replaced = self.waiters.lock().insert(message_id, Arc::clone(&waiter));
        if let Some(old) = replaced {
            debug!(%message_id, "Replacing pending waiter");
            old.close();
        }
        let _registration = Registration {
            registry: self,
            message_id,
            waiter: Arc::clone(&waiter),
        };
        trace!(%message_id, timeout_ms = timeout.as_millis() as u64, "Waiting for interaction");

        tokio::select! {
            biased;
            result = &mut rx => result.ok().flatten(),
            _ = tokio::time::sleep(timeout) => {
                // A delivery may have taken the gate just before the deadline.
                if waiter.close() {
                    debug!(%message_id, "Waiter timed out");
                }
                rx.await.ok().flatten()
            }
        }
    }

    /// Offers an interaction to the waiter on its message.
    ///
    /// Returns `None` when no waiter claims it, so normal routing continues.
    /// A user outside the allow list gets an ephemeral refusal and the
    /// waiter keeps waiting.
    pub async fn deliver(&self, ctx: InteractionContext) -> Option<HandlerResult<Ack>> {
        let message_id = ctx.message_id()?;
        let waiter = self.waiters.lock().get(&message_id).cloned()?;

        if !waiter.allows(ctx.author_id()) {
            debug!(%message_id, author = ?ctx.author_id(), "Interaction rejected by waiter");
            return Some(Ok(Ack::ephemeral(NOT_ALLOWED_MESSAGE)));
        }

        let gate = waiter.gate.lock().take()?;
        self.remove(message_id, &waiter);
        let _ = gate.send(Some(ctx.clone()));
        debug!(%message_id, "Interaction delivered to waiter");

        Some(waiter.follow_up.call(ctx).await)
    }

    /// Removes the entry for `message_id` if it is still `waiter`.
    fn remove(&self, message_id: Snowflake, waiter: &Arc<Waiter>) {
        let mut waiters = self.waiters.lock();
        if waiters
            .get(&message_id)
            .is_some_and(|current| Arc::ptr_eq(current, waiter))
        {
            waiters.remove(&message_id);
        }
    }

    pub fn contains(&self, message_id: Snowflake) -> bool {
        self.waiters.lock().contains_key(&message_id)
    }

    pub fn len(&self) -> usize {
        self.waiters.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use hookline_core::{ResponseType, Snowflake};
    use serde_json::json;

    fn click(message_id: u64, author: u64) -> InteractionContext {
        testing::context(json!({
            "id": "1000000000000000000",
            "type": 3,
            "token": "tok",
            "data": {"custom_id": "yes", "component_type": 2},
            "message": {"id": message_id.to_string()},
            "user": {"id": author.to_string()},
        }))
    }

    async fn confirm(ctx: InteractionContext) -> Ack {
        Ack::update(format!("picked {}", ctx.custom_id().unwrap_or_default()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_removes_waiter() {
        let registry = WaiterRegistry::new();
        let wait = registry.wait(Snowflake(5), vec![], Duration::from_millis(50), confirm);
        tokio::pin!(wait);

        tokio::select! {
            _ = &mut wait => panic!("resolved early"),
            _ = tokio::task::yield_now() => {}
        }
        assert!(registry.contains(Snowflake(5)));

        assert!(wait.await.is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_delivery_resolves_wait_with_context() {
        let registry = WaiterRegistry::new();
        let waiting = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .wait(Snowflake(5), vec![Snowflake(9)], Duration::from_secs(5), confirm)
                    .await
            })
        };
        while !registry.contains(Snowflake(5)) {
            tokio::task::yield_now().await;
        }

        let ack = registry.deliver(click(5, 9)).await.unwrap().unwrap();
        assert_eq!(ack.response().kind, ResponseType::UpdateMessage);
        assert_eq!(ack.response().data.as_ref().unwrap()["content"], "picked yes");

        let ctx = waiting.await.unwrap().unwrap();
        assert_eq!(ctx.author_id(), Some(Snowflake(9)));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_disallowed_user_is_refused() {
        let registry = WaiterRegistry::new();
        let waiting = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .wait(Snowflake(5), vec![Snowflake(9)], Duration::from_secs(5), confirm)
                    .await
            })
        };
        while !registry.contains(Snowflake(5)) {
            tokio::task::yield_now().await;
        }

        let ack = registry.deliver(click(5, 10)).await.unwrap().unwrap();
        let data = ack.response().data.clone().unwrap();
        assert_eq!(data["content"], NOT_ALLOWED_MESSAGE);
        assert_eq!(data["flags"], 64);
        assert!(registry.contains(Snowflake(5)));

        registry.deliver(click(5, 9)).await.unwrap().unwrap();
        assert!(waiting.await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unrelated_message_is_not_claimed() {
        let registry = WaiterRegistry::new();
        assert!(registry.deliver(click(5, 9)).await.is_none());
    }

    #[tokio::test]
    async fn test_replacement_resolves_previous_wait() {
        let registry = WaiterRegistry::new();
        let first = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .wait(Snowflake(5), vec![], Duration::from_secs(5), confirm)
                    .await
            })
        };
        while !registry.contains(Snowflake(5)) {
            tokio::task::yield_now().await;
        }

        let second = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .wait(Snowflake(5), vec![], Duration::from_secs(5), confirm)
                    .await
            })
        };

        assert!(first.await.unwrap().is_none());
        // The first waiter's cleanup must not remove its replacement.
        assert!(registry.contains(Snowflake(5)));

        registry.deliver(click(5, 1)).await.unwrap().unwrap();
        assert!(second.await.unwrap().is_some());
        assert!(registry.is_empty());
    }
}

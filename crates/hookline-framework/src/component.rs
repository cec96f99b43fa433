//! Routing of component and modal interactions by `custom_id`.

use std::collections::HashMap;

use regex::Regex;

use crate::handler::{BoxedComponentHandler, ComponentHandler};

/// Exact `custom_id` routes plus regex routes tried in registration order.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    exact: HashMap<String, BoxedComponentHandler>,
    patterns: Vec<(Regex, BoxedComponentHandler)>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `custom_id` to `handler`, replacing any previous exact route.
    pub fn add(&mut self, custom_id: impl Into<String>, handler: impl ComponentHandler) {
        self.exact.insert(custom_id.into(), std::sync::Arc::new(handler));
    }

    /// Routes every `custom_id` that `pattern` matches from its first
    /// character.
    pub fn add_regex(&mut self, pattern: &str, handler: impl ComponentHandler) -> Result<(), regex::Error> {
        let regex = Regex::new(&format!("^(?:{pattern})"))?;
        self.patterns.push((regex, std::sync::Arc::new(handler)));
        Ok(())
    }

    /// Finds the handler for `custom_id`: exact routes win, then the first
    /// matching pattern.
    pub fn find(&self, custom_id: &str) -> Option<&BoxedComponentHandler> {
        self.exact.get(custom_id).or_else(|| {
            self.patterns
                .iter()
                .find(|(regex, _)| regex.is_match(custom_id))
                .map(|(_, handler)| handler)
        })
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InteractionContext;
    use crate::handler::Ack;
    use crate::testing;
    use serde_json::json;

    fn reply(text: &'static str) -> impl ComponentHandler {
        move |_ctx: InteractionContext| async move { Ack::update(text) }
    }

    async fn route(registry: &ComponentRegistry, custom_id: &str) -> Option<String> {
        let handler = registry.find(custom_id)?;
        let ctx = testing::context(json!({"id": "1000000000000000000", "type": 3}));
        let ack = handler.call(ctx).await.unwrap();
        Some(ack.response().data.as_ref().unwrap()["content"].as_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_exact_beats_pattern_and_patterns_keep_order() {
        let mut registry = ComponentRegistry::new();
        registry.add_regex(r"vote:\d+", reply("first")).unwrap();
        registry.add_regex(r"vote:", reply("second")).unwrap();
        registry.add("vote:1", reply("exact"));

        assert_eq!(route(&registry, "vote:1").await.as_deref(), Some("exact"));
        assert_eq!(route(&registry, "vote:42").await.as_deref(), Some("first"));
        assert_eq!(route(&registry, "vote:abc").await.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_patterns_anchor_at_start() {
        let mut registry = ComponentRegistry::new();
        registry.add_regex(r"del-\d+", reply("delete")).unwrap();
        assert!(registry.find("undel-4").is_none());
        assert_eq!(route(&registry, "del-4-extra").await.as_deref(), Some("delete"));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let mut registry = ComponentRegistry::new();
        assert!(registry.add_regex("(", reply("x")).is_err());
        assert!(registry.is_empty());
    }
}

use crate::tools::types::{Citation, ToolDefinition};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// A tool the model can invoke by name.
///
/// `execute` returns the text fed back to the model on success; an `Err` is a
/// tool-level failure that the orchestration loop absorbs into the transcript
/// rather than propagating. Tools that cite their results keep the citations
/// of the most recent invocation only (last call wins).
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn execute(&self, args: Value) -> Result<String, String>;

    /// Citations recorded by the most recent invocation
    fn last_sources(&self) -> Vec<Citation> {
        Vec::new()
    }

    fn reset_sources(&self) {}
}

/// Registry of tools exposed to the model, preserving registration order
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry { tools: Vec::new() }
    }

    /// Register a tool under its declared name. Re-registering a name
    /// replaces the previous handler in place (last write wins).
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        if let Some(existing) = self
            .tools
            .iter_mut()
            .find(|t| t.definition().name == name)
        {
            *existing = tool;
        } else {
            self.tools.push(tool);
        }
    }

    /// Definitions of every registered tool, in registration order
    pub fn get_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Dispatch to the named tool. An unknown name is not an error: the
    /// sentinel text goes back to the model, which can recover by trying a
    /// different tool or answering from general knowledge.
    pub async fn execute_tool(&self, name: &str, args: Value) -> Result<String, String> {
        match self.tools.iter().find(|t| t.definition().name == name) {
            Some(tool) => tool.execute(args).await,
            None => Ok(format!("Tool '{}' not found", name)),
        }
    }

    /// Citations from the last invocation of every registered tool, in
    /// registration order
    pub fn get_last_sources(&self) -> Vec<Citation> {
        self.tools.iter().flat_map(|t| t.last_sources()).collect()
    }

    /// Clear citation state on every tool. Callers must do this between
    /// independent questions to avoid citation leakage across turns.
    pub fn reset_sources(&self) {
        for tool in &self.tools {
            tool.reset_sources();
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::types::ToolInputSchema;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    struct StubTool {
        name: &'static str,
        reply: &'static str,
        sources: Mutex<Vec<Citation>>,
    }

    impl StubTool {
        fn new(name: &'static str, reply: &'static str) -> Self {
            StubTool {
                name,
                reply,
                sources: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Tool for StubTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: self.name.to_string(),
                description: "stub".to_string(),
                input_schema: ToolInputSchema::object(HashMap::new(), vec![]),
            }
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            *self.sources.lock() = vec![Citation::new(format!("{} source", self.name), None)];
            Ok(self.reply.to_string())
        }

        fn last_sources(&self) -> Vec<Citation> {
            self.sources.lock().clone()
        }

        fn reset_sources(&self) {
            self.sources.lock().clear();
        }
    }

    #[tokio::test]
    async fn test_register_and_execute() {
        let mut registry = ToolRegistry::new();
        assert!(registry.is_empty());

        registry.register(Arc::new(StubTool::new("alpha", "alpha says hi")));
        assert_eq!(registry.len(), 1);

        let result = registry
            .execute_tool("alpha", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(result, "alpha says hi");
    }

    #[tokio::test]
    async fn test_execute_unknown_tool_returns_sentinel() {
        let registry = ToolRegistry::new();
        let result = registry
            .execute_tool("nonexistent_tool", serde_json::json!({"query": "test"}))
            .await
            .unwrap();
        assert_eq!(result, "Tool 'nonexistent_tool' not found");
    }

    #[tokio::test]
    async fn test_definitions_in_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StubTool::new("beta", "")));
        registry.register(Arc::new(StubTool::new("alpha", "")));

        let names: Vec<String> = registry
            .get_tool_definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["beta", "alpha"]);
    }

    #[tokio::test]
    async fn test_reregister_replaces_in_place() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StubTool::new("alpha", "old")));
        registry.register(Arc::new(StubTool::new("beta", "")));
        registry.register(Arc::new(StubTool::new("alpha", "new")));

        assert_eq!(registry.len(), 2);
        let names: Vec<String> = registry
            .get_tool_definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["alpha", "beta"]);

        let result = registry
            .execute_tool("alpha", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(result, "new");
    }

    #[tokio::test]
    async fn test_sources_collected_and_reset() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StubTool::new("alpha", "")));
        registry.register(Arc::new(StubTool::new("beta", "")));

        assert!(registry.get_last_sources().is_empty());

        registry
            .execute_tool("beta", serde_json::json!({}))
            .await
            .unwrap();
        registry
            .execute_tool("alpha", serde_json::json!({}))
            .await
            .unwrap();

        // Registration order, not invocation order
        let sources = registry.get_last_sources();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].label, "alpha source");
        assert_eq!(sources[1].label, "beta source");

        registry.reset_sources();
        assert!(registry.get_last_sources().is_empty());
    }
}

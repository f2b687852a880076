use crate::context::ToolContext;
use amb_core::ToolDefinition;
use async_trait::async_trait;
use errors::ToolError;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;

    /// Runs the tool and returns the text handed back to the model.
    async fn call(&self, ctx: &ToolContext, params: Value) -> Result<String, ToolError>;
}

/// Deserializes tool arguments; a missing argument object counts as `{}`.
pub fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, ToolError> {
    let params = if params.is_null() {
        Value::Object(Default::default())
    } else {
        params
    };
    serde_json::from_value(params).map_err(|e| ToolError::invalid_input("arguments", e.to_string()))
}

pub fn schema_of<T: JsonSchema>() -> Value {
    schemars::schema_for!(T).to_value()
}

#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub async fn call(&self, ctx: &ToolContext, name: &str, params: Value) -> Result<String, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string()
        })?;
        tool.call(ctx, params).await
    }

    /// Definitions in registration order.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    struct EchoParams {
        text: String,
        #[serde(default)]
        times: Option<u32>
    }

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Repeats text"
        }

        fn input_schema(&self) -> Value {
            schema_of::<EchoParams>()
        }

        async fn call(&self, _ctx: &ToolContext, params: Value) -> Result<String, ToolError> {
            let p: EchoParams = parse_params(params)?;
            Ok(p.text.repeat(p.times.unwrap_or(1) as usize))
        }
    }

    fn ctx() -> ToolContext {
        ToolContext::new(
            "s",
            crate::context::NO_IMAGE,
            Default::default(),
            Default::default(),
            std::env::temp_dir(),
            "combined_audio.wav"
        )
    }

    #[tokio::test]
    async fn test_registry_dispatch() {
        let registry = ToolRegistry::new().with(Arc::new(Echo));
        let out = registry
            .call(&ctx(), "echo", serde_json::json!({ "text": "ab", "times": 2 }))
            .await
            .unwrap();
        assert_eq!(out, "abab");

        let err = registry
            .call(&ctx(), "missing", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool { .. }));
    }

    #[tokio::test]
    async fn test_bad_arguments_are_invalid_input() {
        let registry = ToolRegistry::new().with(Arc::new(Echo));
        let err = registry
            .call(&ctx(), "echo", serde_json::json!({ "times": 2 }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_schema_lists_properties() {
        let schema = schema_of::<EchoParams>();
        assert!(schema["properties"]["text"].is_object());
        assert_eq!(Echo.name(), ToolRegistry::new().with(Arc::new(Echo)).names()[0]);
    }
}

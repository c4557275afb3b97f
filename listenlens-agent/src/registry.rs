use std::collections::HashMap;
use std::sync::Arc;

use listenlens_core::{QueryTool, ToolSpec};

use crate::error::BuildError;

/// Immutable name-to-tool map, built once at startup. Unknown names are
/// rejected when a plan is validated, not when a call is dispatched.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn QueryTool>>,
    specs: Vec<ToolSpec>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Arc<dyn QueryTool>>) -> Result<Self, BuildError> {
        let mut map: HashMap<String, Arc<dyn QueryTool>> = HashMap::new();
        for tool in tools {
            let name = tool.name().to_string();
            if map.contains_key(&name) {
                return Err(BuildError::DuplicateToolName(name));
            }
            map.insert(name, tool);
        }

        let mut specs: Vec<ToolSpec> = map.values().map(|tool| ToolSpec::of(tool.as_ref())).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Self { tools: map, specs })
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn QueryTool>> {
        self.tools.get(name).map(Arc::clone)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Declared tool surfaces, sorted by name for stable prompt output.
    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use listenlens_core::{ToolError, Value};

    struct Named(&'static str);

    #[async_trait::async_trait]
    impl QueryTool for Named {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "test tool"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({ "type": "object" })
        }
        async fn invoke(&self, _args: Value) -> Result<Value, ToolError> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn rejects_duplicate_names() {
        let result = ToolRegistry::new(vec![Arc::new(Named("a")), Arc::new(Named("a"))]);
        assert!(matches!(result, Err(BuildError::DuplicateToolName(name)) if name == "a"));
    }

    #[test]
    fn specs_are_sorted_by_name() {
        let registry =
            ToolRegistry::new(vec![Arc::new(Named("zeta")), Arc::new(Named("alpha"))]).unwrap();
        let names: Vec<&str> = registry.specs().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert!(registry.contains("zeta"));
        assert!(registry.get("missing").is_none());
    }
}

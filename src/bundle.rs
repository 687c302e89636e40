//! Result bundle: the resolved registries plus ancillary result values,
//! serialized as one response payload.

use crate::error::LoadError;
use crate::registry::EntityMaps;
use crate::viewer::ViewerContext;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize)]
pub struct ResultBundle {
    #[serde(flatten)]
    pub maps: EntityMaps,
    /// Named values outside the entity model, e.g. an ordered id list
    pub result: Map<String, Value>,
    pub viewer: ViewerContext,
}

impl ResultBundle {
    pub fn new(viewer: ViewerContext) -> Self {
        Self {
            maps: EntityMaps::new(),
            result: Map::new(),
            viewer,
        }
    }

    pub fn set_result<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), LoadError> {
        let value = serde_json::to_value(value).map_err(|e| {
            LoadError::InvalidInput(format!("Result value '{}' is not serializable: {}", key, e))
        })?;
        self.result.insert(key.to_string(), value);
        Ok(())
    }

    pub fn result(&self, key: &str) -> Option<&Value> {
        self.result.get(key)
    }

    pub fn to_json(&self) -> Result<Value, LoadError> {
        serde_json::to_value(self)
            .map_err(|e| LoadError::InvalidInput(format!("Failed to serialize bundle: {}", e)))
    }

    pub fn to_json_pretty(&self) -> Result<String, LoadError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LoadError::InvalidInput(format!("Failed to serialize bundle: {}", e)))
    }
}

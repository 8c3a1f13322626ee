//! Save/load archive for tool parameters, backed by a JSON object

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// Two-way parameter store behind [`super::Tool::serialize`].
///
/// When saving, [`ParamArchive::value`] writes the field; when loading, it
/// overwrites the field with the stored entry if there is one.
#[derive(Debug, Clone, Default)]
pub struct ParamArchive {
    values: Map<String, Value>,
    loading: bool,
}

impl ParamArchive {
    pub fn saving() -> Self {
        Self::default()
    }

    pub fn loading(values: Map<String, Value>) -> Self {
        ParamArchive {
            values,
            loading: true,
        }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::loading(serde_json::from_str(text)?))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.values)
    }

    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    /// Flip a saved archive around so it can be read back.
    pub fn into_loading(self) -> Self {
        Self::loading(self.values)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn value<T: Serialize + DeserializeOwned>(&mut self, key: &str, field: &mut T) -> Result<(), serde_json::Error> {
        if self.loading {
            if let Some(stored) = self.values.get(key) {
                *field = serde_json::from_value(stored.clone())?;
            }
        } else {
            self.values.insert(key.to_string(), serde_json::to_value(&*field)?);
        }
        Ok(())
    }
}

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// Named attributes handed to a view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    attributes: Map<String, Value>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T>(&mut self, key: impl Into<String>, value: &T) -> Result<(), serde_json::Error>
    where
        T: Serialize + ?Sized,
    {
        self.attributes
            .insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn with<T>(mut self, key: impl Into<String>, value: &T) -> Result<Self, serde_json::Error>
    where
        T: Serialize + ?Sized,
    {
        self.insert(key, value)?;
        Ok(self)
    }

    /// Copy every field of a struct-like value into the model, replacing existing keys.
    pub fn merge<T>(mut self, value: &T) -> Result<Self, serde_json::Error>
    where
        T: Serialize + ?Sized,
    {
        match serde_json::to_value(value)? {
            Value::Object(fields) => {
                self.attributes.extend(fields);
                Ok(self)
            }
            other => Err(serde::ser::Error::custom(format!(
                "expected a map of attributes, got `{other}`"
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Bind the attributes to a typed view model. Unknown attributes are ignored.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.attributes.clone()))
    }
}

impl From<Map<String, Value>> for Model {
    fn from(attributes: Map<String, Value>) -> Self {
        Self { attributes }
    }
}

//! Named beans: the business payload of content objects.
//!
//! A bean is a named bag of typed properties. Binding handlers read and write
//! bean properties by name; nested beans are stored as property values.
//! Bean instantiation goes through a [`BeanRegistry`] of factory closures,
//! resolved once when a binding tree is built.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::handle::{ContentHandle, ContentType};

/// A typed property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// Reference to another content object.
    Handle(ContentHandle),
    /// Nested bean.
    Bean(Box<Bean>),
}

impl Value {
    /// Whether the value counts as empty for `skip-if-empty` and merge rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Handle(handle) => !handle.is_set(),
            _ => false,
        }
    }

    /// Text form written to XML. Nested beans have none.
    #[must_use]
    pub fn to_xml_text(&self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text.clone()),
            Self::Integer(value) => Some(value.to_string()),
            Self::Float(value) => Some(value.to_string()),
            Self::Boolean(value) => Some(value.to_string()),
            Self::Handle(handle) => Some(handle.to_reference()),
            Self::Bean(_) => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bean(&self) -> Option<&Bean> {
        match self {
            Self::Bean(bean) => Some(bean),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<ContentHandle> for Value {
    fn from(handle: ContentHandle) -> Self {
        Self::Handle(handle)
    }
}

impl From<Bean> for Value {
    fn from(bean: Bean) -> Self {
        Self::Bean(Box::new(bean))
    }
}

/// Declared type of a bound property, used to convert XML text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    Text,
    Integer,
    Float,
    Boolean,
    Handle(ContentType),
}

impl ValueType {
    /// Convert XML text to a value of this type.
    ///
    /// Empty text yields `Text("")` for text properties and `None` for every
    /// other type.
    ///
    /// # Errors
    /// Returns `Conversion` when the text is not a valid value of this type.
    pub fn parse(&self, property: &str, text: &str) -> Result<Option<Value>> {
        if text.is_empty() && *self != Self::Text {
            return Ok(None);
        }

        let conversion_error = || SyncError::Conversion {
            property: property.to_string(),
            value: text.to_string(),
            expected: self.to_string(),
        };

        let value = match self {
            Self::Text => Value::Text(text.to_string()),
            Self::Integer => Value::Integer(text.trim().parse().map_err(|_| conversion_error())?),
            Self::Float => Value::Float(text.trim().parse().map_err(|_| conversion_error())?),
            Self::Boolean => match text.trim() {
                "true" | "1" => Value::Boolean(true),
                "false" | "0" => Value::Boolean(false),
                _ => return Err(conversion_error()),
            },
            Self::Handle(content_type) => Value::Handle(
                ContentHandle::parse_reference(content_type.clone(), text.trim())
                    .map_err(|_| conversion_error())?,
            ),
        };
        Ok(Some(value))
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Integer => f.write_str("integer"),
            Self::Float => f.write_str("float"),
            Self::Boolean => f.write_str("boolean"),
            Self::Handle(content_type) => write!(f, "{content_type} handle"),
        }
    }
}

/// A named bean with typed properties.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Bean {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    #[serde(default)]
    properties: BTreeMap<String, Value>,
}

impl Bean {
    /// Create an empty bean. The name is its natural element name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            properties: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set a property (builder style).
    #[must_use]
    pub fn with(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(property.into(), value.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    #[must_use]
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.properties.get(property)
    }

    pub fn set(&mut self, property: impl Into<String>, value: Value) -> Option<Value> {
        self.properties.insert(property.into(), value)
    }

    pub fn remove(&mut self, property: &str) -> Option<Value> {
        self.properties.remove(property)
    }

    /// Whether the property holds a non-empty value.
    #[must_use]
    pub fn has_value(&self, property: &str) -> bool {
        self.properties.get(property).is_some_and(|v| !v.is_empty())
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// All content handles referenced by this bean and its nested beans.
    #[must_use]
    pub fn referenced_handles(&self) -> Vec<&ContentHandle> {
        let mut handles = Vec::new();
        self.collect_handles(&mut handles);
        handles
    }

    fn collect_handles<'a>(&'a self, handles: &mut Vec<&'a ContentHandle>) {
        for value in self.properties.values() {
            match value {
                Value::Handle(handle) => handles.push(handle),
                Value::Bean(bean) => bean.collect_handles(handles),
                _ => {}
            }
        }
    }

    /// Replace every handle equal to `from` with `to`, recursively.
    ///
    /// Returns the number of rewritten references.
    pub fn rewrite_handles(&mut self, from: &ContentHandle, to: &ContentHandle) -> usize {
        let mut rewritten = 0;
        for value in self.properties.values_mut() {
            match value {
                Value::Handle(handle) if handle.matches(from) => {
                    *handle = to.clone();
                    rewritten += 1;
                }
                Value::Bean(bean) => rewritten += bean.rewrite_handles(from, to),
                _ => {}
            }
        }
        rewritten
    }
}

/// Factory producing a fresh bean instance.
pub type BeanFactory = Arc<dyn Fn() -> Bean + Send + Sync>;

/// Registry mapping bean ids to factories.
#[derive(Clone, Default)]
pub struct BeanRegistry {
    factories: HashMap<String, BeanFactory>,
}

impl BeanRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for a bean id.
    pub fn register(
        &mut self,
        bean_id: impl Into<String>,
        factory: impl Fn() -> Bean + Send + Sync + 'static,
    ) {
        self.factories.insert(bean_id.into(), Arc::new(factory));
    }

    /// Register a factory producing an empty bean with the given natural name.
    pub fn register_named(&mut self, bean_id: impl Into<String>, name: impl Into<String>) {
        let name = name.into();
        self.register(bean_id, move || Bean::new(name.clone()));
    }

    /// Look up the factory for a bean id.
    ///
    /// # Errors
    /// Returns `UnknownBeanFactory` when nothing is registered.
    pub fn factory(&self, bean_id: &str) -> Result<BeanFactory> {
        self.factories
            .get(bean_id)
            .cloned()
            .ok_or_else(|| SyncError::UnknownBeanFactory(bean_id.to_string()))
    }

    #[must_use]
    pub fn contains(&self, bean_id: &str) -> bool {
        self.factories.contains_key(bean_id)
    }
}

impl fmt::Debug for BeanRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("BeanRegistry").field("bean_ids", &ids).finish()
    }
}

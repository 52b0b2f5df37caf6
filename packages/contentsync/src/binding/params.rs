//! Per-node handler parameters and the value probe used by `should_execute`.

use crate::tuple::Operation;

/// Declared field-level policy of a handler node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerParams {
    pub skip_on_insert: bool,
    pub skip_on_update: bool,
    pub skip_on_delete: bool,
    pub skip_if_empty: bool,
    pub skip_if_null: bool,
    pub preserve_namespace: bool,
    pub replace: bool,
}

impl HandlerParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn skip_on_insert(mut self) -> Self {
        self.skip_on_insert = true;
        self
    }

    #[must_use]
    pub fn skip_on_update(mut self) -> Self {
        self.skip_on_update = true;
        self
    }

    #[must_use]
    pub fn skip_on_delete(mut self) -> Self {
        self.skip_on_delete = true;
        self
    }

    #[must_use]
    pub fn skip_if_empty(mut self) -> Self {
        self.skip_if_empty = true;
        self
    }

    #[must_use]
    pub fn skip_if_null(mut self) -> Self {
        self.skip_if_null = true;
        self
    }

    #[must_use]
    pub fn preserve_namespace(mut self) -> Self {
        self.preserve_namespace = true;
        self
    }

    #[must_use]
    pub fn replace(mut self) -> Self {
        self.replace = true;
        self
    }

    /// Whether the node is skipped for the given operation mode.
    #[must_use]
    pub fn skips(&self, operation: Operation) -> bool {
        match operation {
            Operation::Insert => self.skip_on_insert,
            Operation::Update => self.skip_on_update,
            Operation::Delete => self.skip_on_delete,
        }
    }

    /// Whether any parameter can drop data for the given operation mode.
    #[must_use]
    pub fn is_lossy_for(&self, operation: Option<Operation>) -> bool {
        operation.is_some_and(|op| self.skips(op)) || self.skip_if_empty || self.skip_if_null
    }

    /// Parse a comma-separated parameter list such as `"skip-on-delete, replace"`.
    ///
    /// Unknown names are returned as the error value.
    pub fn parse(list: &str) -> Result<Self, String> {
        let mut params = Self::default();
        for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            match name {
                "skip-on-insert" => params.skip_on_insert = true,
                "skip-on-update" => params.skip_on_update = true,
                "skip-on-delete" => params.skip_on_delete = true,
                "skip-if-empty" => params.skip_if_empty = true,
                "skip-if-null" => params.skip_if_null = true,
                "preserve-namespace" => params.preserve_namespace = true,
                "replace" => params.replace = true,
                unknown => return Err(unknown.to_string()),
            }
        }
        Ok(params)
    }
}

/// What a handler found when probing its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueState {
    /// The node carries no value of its own (plain elements, tuples).
    Unbound,
    /// The value is absent.
    Null,
    /// The value is present but empty.
    Empty,
    /// The value is present and non-empty.
    Present,
}

impl ValueState {
    #[must_use]
    pub fn of_text(text: Option<&str>) -> Self {
        match text {
            None => Self::Null,
            Some("") => Self::Empty,
            Some(_) => Self::Present,
        }
    }
}

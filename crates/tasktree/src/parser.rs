//! Playbook document parser.
//!
//! A playbook is a YAML sequence of element mappings. Every key of a mapping
//! is either a control field or the name of a registered task kind; anything
//! else fails the whole file.

use serde_yaml::{Mapping, Value};
use std::path::Path;

use crate::element::{Element, ElementId, ElementTree, Environment, LoopSpec, TaskInvocation};
use crate::error::ParseError;
use crate::registry::TaskRegistry;
use crate::template::condition_template;

/// Keys with built-in meaning on every element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlField {
    Name,
    Register,
    When,
    Environment,
    Loop,
    IgnoreErrors,
    Block,
}

impl ControlField {
    pub const ALL: [ControlField; 7] = [
        ControlField::Name,
        ControlField::Register,
        ControlField::When,
        ControlField::Environment,
        ControlField::Loop,
        ControlField::IgnoreErrors,
        ControlField::Block,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlField::Name => "name",
            ControlField::Register => "register",
            ControlField::When => "when",
            ControlField::Environment => "environment",
            ControlField::Loop => "loop",
            ControlField::IgnoreErrors => "ignore_errors",
            ControlField::Block => "block",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == key)
    }
}

impl std::fmt::Display for ControlField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds element trees, recognizing task keys from a registry.
pub struct Parser<'r> {
    registry: &'r TaskRegistry,
}

impl<'r> Parser<'r> {
    pub fn new(registry: &'r TaskRegistry) -> Self {
        Self { registry }
    }

    /// Read and parse a playbook file.
    pub fn parse_file(&self, path: &Path) -> Result<ElementTree, ParseError> {
        let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let tree = self.parse_str(&text)?;
        tracing::debug!(
            file = %path.display(),
            elements = tree.len(),
            roots = tree.roots().len(),
            "Parsed playbook"
        );
        Ok(tree)
    }

    /// Parse playbook text.
    pub fn parse_str(&self, text: &str) -> Result<ElementTree, ParseError> {
        if text.trim().is_empty() {
            return Ok(ElementTree::new());
        }
        let document: Value = serde_yaml::from_str(text)?;
        self.parse_value(&document)
    }

    /// Parse an already decoded document node.
    pub fn parse_value(&self, document: &Value) -> Result<ElementTree, ParseError> {
        let mut tree = ElementTree::new();
        match document {
            Value::Null => {}
            Value::Sequence(_) => {
                for id in self.parse_sequence(document, "", None, &mut tree)? {
                    tree.add_root(id);
                }
            }
            other => {
                return Err(ParseError::UnexpectedNode {
                    path: "<document>".to_string(),
                    expected: "sequence",
                    found: node_kind(other),
                })
            }
        }
        Ok(tree)
    }

    fn parse_sequence(
        &self,
        node: &Value,
        path: &str,
        parent: Option<ElementId>,
        tree: &mut ElementTree,
    ) -> Result<Vec<ElementId>, ParseError> {
        let items = node.as_sequence().ok_or_else(|| unexpected(path, "sequence", node))?;
        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                self.parse_element(item, &format!("{}[{}]", path, index), parent, tree)
            })
            .collect()
    }

    fn parse_element(
        &self,
        node: &Value,
        path: &str,
        parent: Option<ElementId>,
        tree: &mut ElementTree,
    ) -> Result<ElementId, ParseError> {
        let mapping = node.as_mapping().ok_or_else(|| unexpected(path, "mapping", node))?;

        // The slot exists before the children so they can point back at it.
        let id = tree.push(Element {
            parent,
            ..Element::default()
        });
        let mut element = Element {
            parent,
            ..Element::default()
        };

        for (key, value) in mapping {
            let key = key.as_str().ok_or_else(|| unexpected(path, "string key", key))?;
            let field_path = format!("{}.{}", path, key);

            match ControlField::from_key(key) {
                Some(field) => {
                    self.parse_field(field, value, &field_path, id, tree, &mut element)?
                }
                None if self.registry.has(key) => {
                    if let Some(existing) = &element.task {
                        return Err(ParseError::DuplicateTask {
                            path: path.to_string(),
                            existing: existing.name.clone(),
                            task: key.to_string(),
                        });
                    }
                    element.task = Some(parse_task(key, value, &field_path)?);
                }
                None => {
                    return Err(ParseError::UnknownField {
                        path: path.to_string(),
                        field: key.to_string(),
                    })
                }
            }
        }

        element.validate().map_err(|reason| ParseError::InvalidElement {
            path: path.to_string(),
            reason,
        })?;
        tree[id] = element;
        Ok(id)
    }

    fn parse_field(
        &self,
        field: ControlField,
        value: &Value,
        path: &str,
        id: ElementId,
        tree: &mut ElementTree,
        element: &mut Element,
    ) -> Result<(), ParseError> {
        match field {
            ControlField::Name => element.name = Some(scalar_string(value, path)?),
            ControlField::Register => element.register = Some(scalar_string(value, path)?),
            ControlField::When => element.when = parse_when(value, path)?,
            ControlField::Environment => element.environment = parse_environment(value, path)?,
            ControlField::Loop => element.loop_spec = Some(parse_loop(value, path)?),
            ControlField::IgnoreErrors => {
                element.ignore_errors = value
                    .as_bool()
                    .ok_or_else(|| unexpected(path, "boolean", value))?
            }
            ControlField::Block => {
                element.block = self.parse_sequence(value, path, Some(id), tree)?
            }
        }
        Ok(())
    }
}

fn parse_task(name: &str, value: &Value, path: &str) -> Result<TaskInvocation, ParseError> {
    if !value.is_mapping() {
        return Err(ParseError::InvalidField {
            path: path.to_string(),
            field: name.to_string(),
            reason: format!("Task config must be a mapping, found {}", node_kind(value)),
        });
    }
    let invalid = |reason: String| ParseError::InvalidField {
        path: path.to_string(),
        field: name.to_string(),
        reason,
    };
    match serde_json::to_value(value).map_err(|e| invalid(e.to_string()))? {
        serde_json::Value::Object(config) => Ok(TaskInvocation::new(name, config)),
        _ => Err(invalid("Task config must be a mapping".to_string())),
    }
}

fn parse_when(value: &Value, path: &str) -> Result<Vec<String>, ParseError> {
    match value {
        Value::Sequence(conditions) => conditions
            .iter()
            .enumerate()
            .map(|(index, condition)| {
                scalar_string(condition, &format!("{}[{}]", path, index))
                    .map(|c| condition_template(&c))
            })
            .collect(),
        other => Ok(vec![condition_template(&scalar_string(other, path)?)]),
    }
}

fn parse_environment(value: &Value, path: &str) -> Result<Environment, ParseError> {
    let mapping = value.as_mapping().ok_or_else(|| unexpected(path, "mapping", value))?;
    let mut environment = Environment::new();
    for (key, value) in mapping {
        let key = key.as_str().ok_or_else(|| unexpected(path, "string key", key))?;
        let value = scalar_string(value, &format!("{}.{}", path, key))?;
        environment.insert(key.to_string(), value);
    }
    Ok(environment)
}

fn parse_loop(value: &Value, path: &str) -> Result<LoopSpec, ParseError> {
    let mapping: &Mapping = value.as_mapping().ok_or_else(|| unexpected(path, "mapping", value))?;
    let mut var = None;
    let mut items = None;

    for (key, value) in mapping {
        let key = key.as_str().ok_or_else(|| unexpected(path, "string key", key))?;
        let item_path = format!("{}.{}", path, key);
        match key {
            "var" => var = Some(scalar_string(value, &item_path)?),
            "items" => {
                let sequence = value
                    .as_sequence()
                    .ok_or_else(|| unexpected(&item_path, "sequence", value))?;
                let decoded = sequence
                    .iter()
                    .map(serde_json::to_value)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| ParseError::InvalidField {
                        path: path.to_string(),
                        field: "items".to_string(),
                        reason: e.to_string(),
                    })?;
                items = Some(decoded);
            }
            other => {
                return Err(ParseError::UnknownField {
                    path: path.to_string(),
                    field: other.to_string(),
                })
            }
        }
    }

    LoopSpec::from_parts(var, items).map_err(|reason| ParseError::InvalidElement {
        path: path.to_string(),
        reason,
    })
}

/// Render a scalar node as text; numbers and booleans keep their YAML spelling.
fn scalar_string(value: &Value, path: &str) -> Result<String, ParseError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(unexpected(path, "scalar", other)),
    }
}

fn unexpected(path: &str, expected: &'static str, found: &Value) -> ParseError {
    ParseError::UnexpectedNode {
        path: path.to_string(),
        expected,
        found: node_kind(found),
    }
}

fn node_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

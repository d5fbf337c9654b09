//! Playbook element model.
//!
//! A parsed file is an [`ElementTree`]: an arena of [`Element`]s addressed by
//! [`ElementId`]. Block children and the parent back-reference are slot
//! indices into the same arena; the parent link never owns anything.

use std::collections::BTreeMap;
use std::ops::{Index, IndexMut};
use std::sync::Arc;

/// Opaque task configuration, captured verbatim from the document.
pub type TaskConfig = serde_json::Map<String, serde_json::Value>;

/// Environment overrides declared on an element.
pub type Environment = BTreeMap<String, String>;

/// Slot index of an element inside its [`ElementTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(usize);

/// One node of a playbook: either a block of children or a task invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    /// Display name.
    pub name: Option<String>,

    /// Child elements, in document order. Empty unless this is a block.
    pub block: Vec<ElementId>,

    /// Guard templates; each renders `true` or `false`.
    pub when: Vec<String>,

    /// Fact name under which the task output is stored.
    pub register: Option<String>,

    /// Own environment overrides (not merged with ancestors).
    pub environment: Environment,

    /// Swallow `run` failures of this element's task.
    pub ignore_errors: bool,

    /// Repeat this element once per loop item.
    pub loop_spec: Option<LoopSpec>,

    /// Task invocation, absent for blocks.
    pub task: Option<TaskInvocation>,

    /// Enclosing block element, absent for roots.
    pub parent: Option<ElementId>,
}

impl Element {
    /// Returns true if the element has children.
    pub fn is_block(&self) -> bool {
        !self.block.is_empty()
    }

    /// Name used in logs: explicit name, else task kind, else `block`.
    pub fn display_name(&self) -> &str {
        if let Some(name) = &self.name {
            return name;
        }
        match &self.task {
            Some(task) => &task.name,
            None => "block",
        }
    }

    /// Check the structural rules of an element.
    pub fn validate(&self) -> Result<(), String> {
        if self.is_block() {
            if self.register.is_some() {
                return Err("Block cannot have register".to_string());
            }
            if self.task.is_some() {
                return Err("Block cannot have task".to_string());
            }
        } else if self.task.is_none() {
            return Err("Element must have either a block or a task".to_string());
        }
        Ok(())
    }
}

/// Source of loop items.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopSpec {
    /// Template expected to render a JSON array.
    Var(String),
    /// Literal item list.
    Items(Vec<serde_json::Value>),
}

impl LoopSpec {
    /// Build a loop spec from its optional parts; exactly one must be set.
    ///
    /// An empty `items` list counts as unset.
    pub fn from_parts(
        var: Option<String>,
        items: Option<Vec<serde_json::Value>>,
    ) -> Result<Self, String> {
        let items = items.filter(|items| !items.is_empty());
        match (var, items) {
            (Some(var), None) => Ok(LoopSpec::Var(var)),
            (None, Some(items)) => Ok(LoopSpec::Items(items)),
            (Some(_), Some(_)) => Err("Loop var and items are both set".to_string()),
            (None, None) => Err("Either var or items must be set".to_string()),
        }
    }
}

/// A task kind name plus its opaque configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskInvocation {
    pub name: String,
    pub config: Arc<TaskConfig>,
}

impl TaskInvocation {
    pub fn new(name: impl Into<String>, config: TaskConfig) -> Self {
        Self {
            name: name.into(),
            config: Arc::new(config),
        }
    }
}

/// Arena holding every element of one parsed file.
#[derive(Debug, Clone, Default)]
pub struct ElementTree {
    elements: Vec<Element>,
    roots: Vec<ElementId>,
}

impl ElementTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an element and return its slot.
    pub fn push(&mut self, element: Element) -> ElementId {
        let id = ElementId(self.elements.len());
        self.elements.push(element);
        id
    }

    /// Append a top-level element to the execution order.
    pub fn add_root(&mut self, id: ElementId) {
        self.roots.push(id);
    }

    pub fn roots(&self) -> &[ElementId] {
        &self.roots
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id.0)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(id.0)
    }

    /// Number of elements at any depth.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Iterate the children of a block element.
    pub fn children(&self, id: ElementId) -> impl Iterator<Item = (ElementId, &Element)> {
        self[id].block.iter().map(move |child| (*child, &self[*child]))
    }
}

impl Index<ElementId> for ElementTree {
    type Output = Element;

    fn index(&self, id: ElementId) -> &Element {
        &self.elements[id.0]
    }
}

impl IndexMut<ElementId> for ElementTree {
    fn index_mut(&mut self, id: ElementId) -> &mut Element {
        &mut self.elements[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(name: &str) -> Element {
        Element {
            task: Some(TaskInvocation::new(name, TaskConfig::new())),
            ..Element::default()
        }
    }

    #[test]
    fn test_display_name() {
        let mut element = task("shell");
        assert_eq!(element.display_name(), "shell");

        element.name = Some("Install packages".to_string());
        assert_eq!(element.display_name(), "Install packages");

        assert_eq!(Element::default().display_name(), "block");
    }

    #[test]
    fn test_validate_block_task_exclusion() {
        let mut tree = ElementTree::new();
        let child = tree.push(task("shell"));

        let mut element = task("shell");
        element.block = vec![child];
        assert_eq!(element.validate().unwrap_err(), "Block cannot have task");

        element.task = None;
        element.register = Some("out".to_string());
        assert_eq!(element.validate().unwrap_err(), "Block cannot have register");

        element.register = None;
        assert!(element.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_block_or_task() {
        let element = Element {
            name: Some("empty".to_string()),
            ..Element::default()
        };
        assert!(element.validate().is_err());
        assert!(task("set_fact").validate().is_ok());
    }

    #[test]
    fn test_loop_spec_from_parts() {
        assert_eq!(
            LoopSpec::from_parts(Some("{{ xs }}".to_string()), None).unwrap(),
            LoopSpec::Var("{{ xs }}".to_string())
        );
        assert_eq!(
            LoopSpec::from_parts(None, Some(vec![json!(1)])).unwrap(),
            LoopSpec::Items(vec![json!(1)])
        );
        assert!(LoopSpec::from_parts(Some("x".to_string()), Some(vec![json!(1)])).is_err());
        assert!(LoopSpec::from_parts(None, None).is_err());
        assert!(LoopSpec::from_parts(None, Some(vec![])).is_err());
    }

    #[test]
    fn test_tree_children() {
        let mut tree = ElementTree::new();
        let parent = tree.push(Element::default());
        let a = tree.push(task("shell"));
        let b = tree.push(task("set_fact"));
        tree.get_mut(parent).unwrap().block = vec![a, b];
        tree.add_root(parent);

        let names: Vec<_> = tree
            .children(parent)
            .map(|(_, child)| child.display_name().to_string())
            .collect();
        assert_eq!(names, vec!["shell", "set_fact"]);
        assert_eq!(tree.roots(), &[parent]);
        assert_eq!(tree.len(), 3);
    }
}

//! Structure-preserving variable resolution.
//!
//! [`resolve`] deep-copies a value, replacing every string leaf with its
//! resolved form and passing every other scalar through. Containers are
//! rebuilt; the input is never mutated.
//!
//! Shared sub-values (`Arc`) and arena slots are tracked by identity for the
//! duration of one call. A repeat visit returns the original reference instead
//! of recursing again, so shared or back-referencing structures terminate and
//! the shared part is resolved once.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::element::{Element, ElementId, ElementTree, Environment, LoopSpec, TaskInvocation};
use crate::error::ResolveError;
use crate::facts::Facts;
use crate::template::TemplateResolver;

/// Values that can be rebuilt from their resolved children.
pub trait Resolve: Sized {
    fn resolve_with(&self, cx: &mut Resolution<'_>) -> Result<Self, ResolveError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Identity {
    Shared(usize),
    Slot(ElementId),
}

/// State of one resolve call: resolver, scope and visited identities.
pub struct Resolution<'a> {
    resolver: &'a dyn TemplateResolver,
    facts: &'a Facts,
    visited: HashSet<Identity>,
}

impl<'a> Resolution<'a> {
    pub fn new(resolver: &'a dyn TemplateResolver, facts: &'a Facts) -> Self {
        Self {
            resolver,
            facts,
            visited: HashSet::new(),
        }
    }

    /// Resolve any resolvable value within this call.
    pub fn resolve<T: Resolve>(&mut self, value: &T) -> Result<T, ResolveError> {
        value.resolve_with(self)
    }

    /// Resolve a single string leaf.
    pub fn resolve_str(&mut self, text: &str) -> Result<String, ResolveError> {
        self.resolver.resolve(text, self.facts)
    }

    /// Mark an arena slot as visited. Returns false if it already was.
    pub fn enter_slot(&mut self, id: ElementId) -> bool {
        self.visited.insert(Identity::Slot(id))
    }

    fn enter_shared<T>(&mut self, value: &Arc<T>) -> bool {
        let address = Arc::as_ptr(value) as *const () as usize;
        self.visited.insert(Identity::Shared(address))
    }
}

/// Resolve `value` against `facts`, producing an independent copy.
///
/// A failure on any leaf aborts the whole call.
pub fn resolve<T: Resolve>(
    value: &T,
    resolver: &dyn TemplateResolver,
    facts: &Facts,
) -> Result<T, ResolveError> {
    Resolution::new(resolver, facts).resolve(value)
}

/// Merge the environment of `id` with those of all its ancestors.
///
/// `own` is the element's environment, already resolved as part of its
/// snapshot; only ancestor environments are resolved here. Ancestors are
/// applied first so the nearest definition wins. The parent chain is walked
/// through [`Resolution::enter_slot`], so a malformed cyclic chain still
/// terminates.
pub fn resolve_environment(
    tree: &ElementTree,
    id: ElementId,
    own: Environment,
    cx: &mut Resolution<'_>,
) -> Result<Environment, ResolveError> {
    let mut chain = Vec::new();
    let mut current = if cx.enter_slot(id) {
        tree.get(id).and_then(|element| element.parent)
    } else {
        None
    };
    while let Some(slot) = current {
        if !cx.enter_slot(slot) {
            break;
        }
        let Some(element) = tree.get(slot) else {
            break;
        };
        chain.push(element);
        current = element.parent;
    }

    let mut merged = Environment::new();
    for element in chain.into_iter().rev() {
        for (key, value) in &element.environment {
            merged.insert(key.clone(), cx.resolve_str(value)?);
        }
    }
    merged.extend(own);
    Ok(merged)
}

impl Resolve for String {
    fn resolve_with(&self, cx: &mut Resolution<'_>) -> Result<Self, ResolveError> {
        cx.resolve_str(self)
    }
}

macro_rules! passthrough {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Resolve for $ty {
                fn resolve_with(&self, _cx: &mut Resolution<'_>) -> Result<Self, ResolveError> {
                    Ok(self.clone())
                }
            }
        )*
    };
}

passthrough!(
    (), bool, char, i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64, ElementId,
);

impl<T: Resolve> Resolve for Option<T> {
    fn resolve_with(&self, cx: &mut Resolution<'_>) -> Result<Self, ResolveError> {
        self.as_ref().map(|v| v.resolve_with(cx)).transpose()
    }
}

impl<T: Resolve> Resolve for Box<T> {
    fn resolve_with(&self, cx: &mut Resolution<'_>) -> Result<Self, ResolveError> {
        Ok(Box::new(self.as_ref().resolve_with(cx)?))
    }
}

impl<T: Resolve> Resolve for Vec<T> {
    fn resolve_with(&self, cx: &mut Resolution<'_>) -> Result<Self, ResolveError> {
        self.iter().map(|v| v.resolve_with(cx)).collect()
    }
}

impl<T: Resolve> Resolve for BTreeMap<String, T> {
    fn resolve_with(&self, cx: &mut Resolution<'_>) -> Result<Self, ResolveError> {
        let mut result = BTreeMap::new();
        for (k, v) in self {
            result.insert(k.clone(), v.resolve_with(cx)?);
        }
        Ok(result)
    }
}

impl<T: Resolve> Resolve for HashMap<String, T> {
    fn resolve_with(&self, cx: &mut Resolution<'_>) -> Result<Self, ResolveError> {
        let mut result = HashMap::new();
        for (k, v) in self {
            result.insert(k.clone(), v.resolve_with(cx)?);
        }
        Ok(result)
    }
}

/// Shared values are resolved once per call; later visits hand back the original.
impl<T: Resolve> Resolve for Arc<T> {
    fn resolve_with(&self, cx: &mut Resolution<'_>) -> Result<Self, ResolveError> {
        if !cx.enter_shared(self) {
            return Ok(Arc::clone(self));
        }
        Ok(Arc::new(self.as_ref().resolve_with(cx)?))
    }
}

impl Resolve for serde_json::Value {
    fn resolve_with(&self, cx: &mut Resolution<'_>) -> Result<Self, ResolveError> {
        match self {
            serde_json::Value::String(s) => Ok(serde_json::Value::String(cx.resolve_str(s)?)),
            serde_json::Value::Array(items) => Ok(serde_json::Value::Array(items.resolve_with(cx)?)),
            serde_json::Value::Object(map) => Ok(serde_json::Value::Object(map.resolve_with(cx)?)),
            other => Ok(other.clone()),
        }
    }
}

// Keys are identifiers, only values are templates.
impl Resolve for serde_json::Map<String, serde_json::Value> {
    fn resolve_with(&self, cx: &mut Resolution<'_>) -> Result<Self, ResolveError> {
        let mut result = serde_json::Map::new();
        for (k, v) in self {
            result.insert(k.clone(), v.resolve_with(cx)?);
        }
        Ok(result)
    }
}

impl Resolve for LoopSpec {
    fn resolve_with(&self, cx: &mut Resolution<'_>) -> Result<Self, ResolveError> {
        Ok(match self {
            LoopSpec::Var(var) => LoopSpec::Var(var.resolve_with(cx)?),
            LoopSpec::Items(items) => LoopSpec::Items(items.resolve_with(cx)?),
        })
    }
}

impl Resolve for TaskInvocation {
    fn resolve_with(&self, cx: &mut Resolution<'_>) -> Result<Self, ResolveError> {
        Ok(TaskInvocation {
            name: self.name.clone(),
            config: self.config.resolve_with(cx)?,
        })
    }
}

impl Resolve for Element {
    fn resolve_with(&self, cx: &mut Resolution<'_>) -> Result<Self, ResolveError> {
        Ok(Element {
            name: self.name.resolve_with(cx)?,
            block: self.block.clone(),
            when: self.when.resolve_with(cx)?,
            register: self.register.resolve_with(cx)?,
            environment: self.environment.resolve_with(cx)?,
            ignore_errors: self.ignore_errors,
            loop_spec: self.loop_spec.resolve_with(cx)?,
            task: self.task.resolve_with(cx)?,
            parent: self.parent,
        })
    }
}

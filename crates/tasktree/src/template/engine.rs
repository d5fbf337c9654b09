//! Jinja2-compatible template resolver using minijinja.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use minijinja::{value::ValueKind, Environment, Error, ErrorKind, Value};

use super::{is_template, TemplateResolver};
use crate::error::ResolveError;
use crate::facts::Facts;

/// Template resolver with Jinja2-compatible syntax and the usual playbook filters.
pub struct JinjaResolver {
    env: Environment<'static>,
}

impl JinjaResolver {
    /// Create a new resolver with custom filters.
    pub fn new() -> Self {
        let mut env = Environment::new();
        // Rendered files must keep their final newline.
        env.set_keep_trailing_newline(true);

        env.add_filter("int", filter_int);
        env.add_filter("float", filter_float);
        env.add_filter("bool", filter_bool);
        env.add_filter("default", filter_default);
        env.add_filter("d", filter_default);
        env.add_filter("tojson", filter_tojson);
        env.add_filter("to_json", filter_tojson);
        env.add_filter("fromjson", filter_fromjson);
        env.add_filter("from_json", filter_fromjson);
        env.add_filter("split", filter_split);
        env.add_filter("b64encode", filter_b64encode);
        env.add_filter("b64decode", filter_b64decode);

        Self { env }
    }

    /// Render a template string against the given scope.
    pub fn render(&self, template: &str, facts: &Facts) -> Result<String, ResolveError> {
        if !is_template(template) {
            return Ok(template.to_string());
        }
        let ctx = Value::from_serialize(facts);
        self.env
            .render_str(template, ctx)
            .map_err(|e| ResolveError::new(template, describe(&e)))
    }
}

impl Default for JinjaResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for JinjaResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JinjaResolver").finish_non_exhaustive()
    }
}

impl TemplateResolver for JinjaResolver {
    fn resolve(&self, template: &str, facts: &Facts) -> Result<String, ResolveError> {
        self.render(template, facts)
    }
}

/// Flatten a minijinja error and its detail into one line.
fn describe(err: &Error) -> String {
    match err.detail() {
        Some(detail) => format!("{}: {}", err.kind(), detail),
        None => err.to_string(),
    }
}

// Custom filters

fn filter_int(value: Value) -> Result<Value, Error> {
    let s = value.to_string();
    if let Ok(n) = s.trim().parse::<i64>() {
        return Ok(Value::from(n));
    }
    if let Ok(f) = s.trim().parse::<f64>() {
        return Ok(Value::from(f as i64));
    }
    Ok(Value::from(0i64))
}

fn filter_float(value: Value) -> Result<Value, Error> {
    let s = value.to_string();
    if let Ok(f) = s.trim().parse::<f64>() {
        return Ok(Value::from(f));
    }
    Ok(Value::from(0.0f64))
}

fn filter_bool(value: Value) -> bool {
    match value.kind() {
        ValueKind::String => matches!(
            value.as_str().unwrap_or_default().trim().to_lowercase().as_str(),
            "true" | "yes" | "on" | "1"
        ),
        _ => value.is_true(),
    }
}

fn filter_default(value: Value, default: Option<Value>) -> Value {
    if value.is_undefined() || value.is_none() {
        default.unwrap_or_else(|| Value::from(""))
    } else {
        value
    }
}

fn filter_tojson(value: Value) -> Result<String, Error> {
    serde_json::to_string(&value)
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("tojson error: {}", e)))
}

fn filter_fromjson(value: Value) -> Result<Value, Error> {
    let s = value.to_string();
    let json: serde_json::Value = serde_json::from_str(&s)
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("fromjson error: {}", e)))?;
    Ok(Value::from_serialize(&json))
}

fn filter_split(value: Value, sep: Option<String>) -> Vec<String> {
    let s = value.to_string();
    match sep {
        Some(sep) => s.split(sep.as_str()).map(|s| s.to_string()).collect(),
        None => s.split_whitespace().map(|s| s.to_string()).collect(),
    }
}

fn filter_b64encode(value: Value) -> String {
    BASE64.encode(value.to_string().as_bytes())
}

fn filter_b64decode(value: Value) -> Result<String, Error> {
    let decoded = BASE64.decode(value.to_string().as_bytes()).map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("b64decode error: {}", e),
        )
    })?;
    String::from_utf8(decoded)
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("utf8 error: {}", e)))
}

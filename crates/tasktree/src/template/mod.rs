//! Template resolution.
//!
//! The engine only relies on the string-in/string-out contract of
//! [`TemplateResolver`]. [`JinjaResolver`] is the default implementation,
//! built on minijinja.

mod engine;

pub use engine::JinjaResolver;

use crate::error::ResolveError;
use crate::facts::Facts;

/// Converts a template string into a resolved string against a scope.
pub trait TemplateResolver {
    fn resolve(&self, template: &str, facts: &Facts) -> Result<String, ResolveError>;
}

impl<F> TemplateResolver for F
where
    F: Fn(&str, &Facts) -> Result<String, ResolveError>,
{
    fn resolve(&self, template: &str, facts: &Facts) -> Result<String, ResolveError> {
        self(template, facts)
    }
}

/// Check if a string contains Jinja2 template syntax.
pub fn is_template(s: &str) -> bool {
    s.contains("{{") || s.contains("{%")
}

/// Wrap a raw `when` condition into a template that renders `true` or `false`.
pub fn condition_template(condition: &str) -> String {
    format!("{{% if {} %}}true{{% else %}}false{{% endif %}}", condition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_template() {
        assert!(is_template("Hello {{ name }}"));
        assert!(is_template("{% for x in items %}{{ x }}{% endfor %}"));
        assert!(!is_template("plain text"));
        assert!(is_template("only {{ opening"));
        assert!(is_template("{% if %}"));
        assert!(!is_template("closing }} only"));
    }

    #[test]
    fn test_condition_template() {
        assert_eq!(
            condition_template("x == 1"),
            "{% if x == 1 %}true{% else %}false{% endif %}"
        );
    }

    #[test]
    fn test_closure_resolver() {
        let upper = |s: &str, _: &Facts| -> Result<String, ResolveError> { Ok(s.to_uppercase()) };
        assert_eq!(upper.resolve("abc", &Facts::new()).unwrap(), "ABC");
    }
}

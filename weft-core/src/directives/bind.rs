//! `:name` / `x-bind:name`: keep an attribute in sync with an expression.

use tracing::warn;

use super::DirectiveArgs;
use crate::error::ReactiveError;
use crate::reactive::Cleanup;
use crate::value::Value;

pub(super) fn bind(args: &DirectiveArgs) -> Option<Cleanup> {
    let Some(attribute) = args.arg.clone().filter(|name| !name.is_empty()) else {
        warn!(exp = %args.exp, "bind directive without an attribute name");
        return None;
    };

    let binding = args.clone();
    args.effect(move || {
        let document = binding.document();
        let written = match binding.get() {
            // absent, not "false"
            Value::Undefined | Value::Null | Value::Bool(false) => {
                document.remove_attribute(binding.node, &attribute);
                Ok(())
            }
            value => document.set_attribute(binding.node, &attribute, &value.to_js_string()),
        };
        written.map_err(|err| ReactiveError::EffectFailed(err.to_string()))
    });
    None
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::super::tests::Fixture;
    use crate::value::Value;

    #[test]
    fn binds_and_removes_attributes() {
        let fixture = Fixture::new([("count", Value::from(0)), ("busy", Value::Bool(true))]);
        let node = fixture.mount("<button></button>");
        fixture.apply(node, ":data-count", "count");
        fixture.apply(node, "x-bind:disabled", "busy");

        let document = fixture.document();
        assert_eq!(document.attribute(node, "data-count").as_deref(), Some("0"));
        assert_eq!(document.attribute(node, "disabled").as_deref(), Some("true"));

        fixture.store.set("count", 5).unwrap();
        fixture.store.set("busy", false).unwrap();
        assert_eq!(document.attribute(node, "data-count").as_deref(), Some("0"));
        fixture.flush();
        assert_eq!(document.attribute(node, "data-count").as_deref(), Some("5"));
        assert!(!document.has_attribute(node, "disabled"));
    }

    #[test]
    fn missing_attribute_name_binds_nothing() {
        let fixture = Fixture::new([("count", Value::from(0))]);
        let node = fixture.mount("<div></div>");
        fixture.apply(node, "x-bind", "count");
        assert_eq!(fixture.context.effect_count(), 0);
    }
}

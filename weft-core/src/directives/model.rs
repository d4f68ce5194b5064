//! `x-model`: two-way binding between a form control and an expression.
//!
//! | control            | event    | element state          |
//! |--------------------|----------|------------------------|
//! | text-like `input`  | `input`  | `value`                |
//! | `textarea`         | `input`  | `value`                |
//! | checkbox           | `change` | `checked`              |
//! | radio              | `change` | `checked`              |
//! | `select`           | `change` | option `selected`      |
//!
//! A checkbox bound to an array toggles its own `value` in the array; bound
//! to a boolean it writes `checked`; otherwise a checked box writes its
//! `value`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use super::DirectiveArgs;
use crate::dom::{Document, NodeId};
use crate::error::ReactiveError;
use crate::reactive::Cleanup;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Text,
    Number,
    Checkbox,
    Radio,
    Select,
}

fn control(document: &Document, node: NodeId) -> Option<Control> {
    match document.tag_name(node)?.as_str() {
        "select" => Some(Control::Select),
        "textarea" => Some(Control::Text),
        "input" => Some(
            match document.property(node, "type").to_js_string().to_ascii_lowercase().as_str() {
                "checkbox" => Control::Checkbox,
                "radio" => Control::Radio,
                "number" | "range" => Control::Number,
                _ => Control::Text,
            },
        ),
        _ => None,
    }
}

pub(super) fn model(args: &DirectiveArgs) -> Option<Cleanup> {
    let document = args.document();
    let Some(control) = control(document, args.node) else {
        warn!(
            tag = ?document.tag_name(args.node),
            exp = %args.exp,
            "x-model only supports input, textarea and select"
        );
        return None;
    };

    let event = match control {
        Control::Text | Control::Number => "input",
        Control::Checkbox | Control::Radio | Control::Select => "change",
    };

    let listener = args.clone();
    document.add_event_listener(
        args.node,
        event,
        move |_| {
            if let Some(value) = read_control(&listener, control) {
                if let Err(err) = listener.assign(value) {
                    warn!(exp = %listener.exp, error = %err, "x-model assignment failed");
                }
            }
        },
        args.context.signal(),
    );

    let binding = args.clone();
    let warned = Arc::new(AtomicBool::new(false));
    args.effect(move || {
        let value = binding.get();
        write_control(&binding, control, &value, &warned)
            .map_err(|err| ReactiveError::EffectFailed(err.to_string()))
    });
    None
}

/// The value the control holds after a user edit, or `None` when nothing
/// should be written.
fn read_control(args: &DirectiveArgs, control: Control) -> Option<Value> {
    let document = args.document();
    let node = args.node;
    let own_value = document.property(node, "value");

    match control {
        Control::Text => Some(own_value),
        Control::Number => Some(Value::Number(own_value.to_number())),
        Control::Radio => Some(own_value),
        Control::Checkbox => {
            let checked = document.property(node, "checked").is_truthy();
            match args.get() {
                Value::Array(items) => {
                    let index = items.iter().position(|v| v.strict_equals(&own_value));
                    match (checked, index) {
                        (false, Some(i)) => {
                            let mut next = items.to_vec();
                            next.remove(i);
                            Some(Value::from(next))
                        }
                        (true, None) => {
                            let mut next = items.to_vec();
                            next.push(own_value);
                            Some(Value::from(next))
                        }
                        _ => None,
                    }
                }
                Value::Bool(_) => Some(Value::Bool(checked)),
                _ => checked.then_some(own_value),
            }
        }
        Control::Select => {
            let selected: Vec<Value> = options(document, node)
                .into_iter()
                .filter(|option| document.property(*option, "selected").is_truthy())
                .map(|option| option_value(document, option))
                .collect();
            if document.property(node, "multiple").is_truthy() {
                Some(Value::from(selected))
            } else {
                Some(selected.into_iter().next().unwrap_or_default())
            }
        }
    }
}

fn write_control(
    args: &DirectiveArgs,
    control: Control,
    value: &Value,
    warned: &AtomicBool,
) -> Result<(), crate::error::DomError> {
    let document = args.document();
    let node = args.node;

    match control {
        Control::Text | Control::Number => {
            document.set_property(node, "value", value.to_display_string())
        }
        Control::Checkbox => {
            let own_value = document.property(node, "value");
            let checked = match value {
                Value::Array(items) => items.iter().any(|v| v.strict_equals(&own_value)),
                Value::Bool(b) => *b,
                other => other.strict_equals(&own_value),
            };
            document.set_property(node, "checked", checked)
        }
        Control::Radio => {
            let own_value = document.property(node, "value");
            document.set_property(node, "checked", value.strict_equals(&own_value))
        }
        Control::Select => {
            if document.property(node, "multiple").is_truthy() {
                if !warned.swap(true, Ordering::Relaxed) {
                    warn!(exp = %args.exp, "x-model does not drive `select[multiple]` from the store");
                }
                return Ok(());
            }
            for option in options(document, node) {
                let selected = value.strict_equals(&option_value(document, option));
                document.set_property(option, "selected", selected)?;
            }
            Ok(())
        }
    }
}

fn options(document: &Document, select: NodeId) -> Vec<NodeId> {
    document
        .descendants(select)
        .into_iter()
        .filter(|node| document.tag_name(*node).as_deref() == Some("option"))
        .collect()
}

/// An option's `value` attribute, or its text when it has none.
fn option_value(document: &Document, option: NodeId) -> Value {
    match document.attribute(option, "value") {
        Some(value) => Value::from(value),
        None => Value::from(document.text_content(option).trim()),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::super::tests::Fixture;
    use crate::dom::{Event, NodeId};
    use crate::value::Value;

    fn fire(fixture: &Fixture, node: NodeId, kind: &str) {
        fixture.document().dispatch_event(Event::new(kind, node));
    }

    #[test]
    fn text_input_round_trip() {
        let fixture = Fixture::new([("name", Value::from("Ada"))]);
        let input = fixture.mount(r#"<input type="text">"#);
        fixture.apply(input, "x-model", "name");
        assert_eq!(fixture.document().property(input, "value"), Value::from("Ada"));

        fixture.document().set_property(input, "value", "Grace").unwrap();
        fire(&fixture, input, "input");
        assert_eq!(fixture.store.get_untracked("name"), Value::from("Grace"));

        fixture.store.set("name", "Lin").unwrap();
        fixture.flush();
        assert_eq!(fixture.document().property(input, "value"), Value::from("Lin"));
    }

    #[test]
    fn number_inputs_write_numbers() {
        let fixture = Fixture::new([("age", Value::from(1))]);
        let input = fixture.mount(r#"<input type="number">"#);
        fixture.apply(input, "x-model", "age");
        fixture.document().set_property(input, "value", "42").unwrap();
        fire(&fixture, input, "input");
        assert_eq!(fixture.store.get_untracked("age"), Value::from(42));
    }

    #[test]
    fn checkbox_arrays_toggle_membership() {
        let fixture = Fixture::new([("picked", Value::from(vec![Value::from("a")]))]);
        let a = fixture.mount(r#"<input type="checkbox" value="a">"#);
        let b = fixture.mount(r#"<input type="checkbox" value="b">"#);
        fixture.apply(a, "x-model", "picked");
        fixture.apply(b, "x-model", "picked");
        assert_eq!(fixture.document().property(a, "checked"), Value::Bool(true));
        assert_eq!(fixture.document().property(b, "checked"), Value::Bool(false));

        fixture.document().set_property(b, "checked", true).unwrap();
        fire(&fixture, b, "change");
        fixture.document().set_property(a, "checked", false).unwrap();
        fire(&fixture, a, "change");

        let picked = fixture.store.get_untracked("picked");
        assert_eq!(picked.as_array().unwrap(), &[Value::from("b")]);
    }

    #[test]
    fn checkbox_booleans() {
        let fixture = Fixture::new([("agree", Value::Bool(false))]);
        let input = fixture.mount(r#"<input type="checkbox">"#);
        fixture.apply(input, "x-model", "agree");
        fixture.document().set_property(input, "checked", true).unwrap();
        fire(&fixture, input, "change");
        assert_eq!(fixture.store.get_untracked("agree"), Value::Bool(true));
    }

    #[test]
    fn radios_share_a_field() {
        let fixture = Fixture::new([("size", Value::from("m"))]);
        let s = fixture.mount(r#"<input type="radio" value="s">"#);
        let m = fixture.mount(r#"<input type="radio" value="m">"#);
        fixture.apply(s, "x-model", "size");
        fixture.apply(m, "x-model", "size");
        assert_eq!(fixture.document().property(m, "checked"), Value::Bool(true));

        fixture.document().set_property(s, "checked", true).unwrap();
        fire(&fixture, s, "change");
        fixture.flush();
        assert_eq!(fixture.store.get_untracked("size"), Value::from("s"));
        assert_eq!(fixture.document().property(m, "checked"), Value::Bool(false));
    }

    #[test]
    fn select_round_trip() {
        let fixture = Fixture::new([("color", Value::from("green"))]);
        let select = fixture.mount(
            r#"<select><option value="red">Red</option><option>green</option></select>"#,
        );
        fixture.apply(select, "x-model", "color");
        let options = fixture.document().children(select);
        assert_eq!(fixture.document().property(options[1], "selected"), Value::Bool(true));

        fixture.document().set_property(options[1], "selected", false).unwrap();
        fixture.document().set_property(options[0], "selected", true).unwrap();
        fire(&fixture, select, "change");
        assert_eq!(fixture.store.get_untracked("color"), Value::from("red"));
    }

    #[test]
    fn unsupported_elements_bind_nothing() {
        let fixture = Fixture::new([("name", Value::from(""))]);
        let div = fixture.mount("<div></div>");
        fixture.apply(div, "x-model", "name");
        assert_eq!(fixture.context.effect_count(), 0);
        assert_eq!(fixture.document().listener_count(div), 0);
    }
}

//! `@event` / `x-on:event`: run an expression when an event fires.
//!
//! The expression is evaluated with the event bound to `$event`. When it
//! evaluates to a function (a component member, a store method or an arrow
//! function), that function is called with the event. So `@click="save"`,
//! `@click="save($event)"` and `@click="e => save(e)"` all work.

use tracing::warn;

use super::DirectiveArgs;
use crate::reactive::Cleanup;
use crate::value::Value;

pub(super) fn on(args: &DirectiveArgs) -> Option<Cleanup> {
    let Some(kind) = args.arg.clone().filter(|kind| !kind.is_empty()) else {
        warn!(exp = %args.exp, "event directive without an event name");
        return None;
    };

    let binding = args.clone();
    args.document().add_event_listener(
        args.node,
        &kind,
        move |event| {
            let event = event.to_value();
            let scope = binding.scope().with_local("$event", event.clone());
            let evaluator = binding.context.evaluator();
            let outcome = component_method(&binding)
                .map(Ok)
                .unwrap_or_else(|| evaluator.try_evaluate(&binding.exp, &scope))
                .and_then(|value| match value {
                    Value::Function(handler) => handler.call(&binding.store, &[event]),
                    other => Ok(other),
                });
            if let Err(err) = outcome {
                warn!(exp = %binding.exp, error = %err, "event handler failed");
            }
        },
        args.context.signal(),
    );
    None
}

/// A component method named by a bare identifier expression. Component
/// methods shadow store methods of the same name.
fn component_method(args: &DirectiveArgs) -> Option<Value> {
    let name = args.exp.trim();
    let mut chars = name.chars();
    let starts_ident = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$');
    if !starts_ident || !chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$') {
        return None;
    }
    args.context.member(name).filter(Value::is_function)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::super::tests::Fixture;
    use crate::dom::Event;
    use crate::value::Value;

    fn click(fixture: &Fixture, node: crate::dom::NodeId) {
        fixture.document().dispatch_event(Event::new("click", node));
    }

    #[test]
    fn expression_handlers_write_the_store() {
        let fixture = Fixture::new([("count", Value::from(0))]);
        let button = fixture.mount("<button></button>");
        fixture.apply(button, "@click", "count += 1");

        click(&fixture, button);
        click(&fixture, button);
        assert_eq!(fixture.store.get_untracked("count"), Value::from(2));
    }

    #[test]
    fn method_names_are_called_with_the_event() {
        let fixture = Fixture::new([
            ("last", Value::Null),
            (
                "remember",
                Value::function("remember", |store, args| {
                    let kind = args
                        .first()
                        .and_then(Value::as_object)
                        .and_then(|event| event.get("type").cloned())
                        .unwrap_or_default();
                    store.set("last", kind)?;
                    Ok(Value::Undefined)
                }),
            ),
        ]);
        let button = fixture.mount("<button></button>");
        fixture.apply(button, "x-on:click", "remember");
        click(&fixture, button);
        assert_eq!(fixture.store.get_untracked("last"), Value::from("click"));
    }

    #[test]
    fn context_members_take_part() {
        let fixture = Fixture::new([("hits", Value::from(0))]);
        fixture.context.define_member(
            "bump",
            Value::function("bump", |store, _| {
                store.update("hits", |n| Value::Number(n.to_number() + 10.0))?;
                Ok(Value::Undefined)
            }),
        );
        let button = fixture.mount("<button></button>");
        fixture.apply(button, "@click", "bump");
        click(&fixture, button);
        assert_eq!(fixture.store.get_untracked("hits"), Value::from(10));
    }

    #[test]
    fn component_methods_shadow_store_methods() {
        let fixture = Fixture::new([
            ("saved_by", Value::Null),
            (
                "save",
                Value::function("save", |store, _| {
                    store.set("saved_by", "store")?;
                    Ok(Value::Undefined)
                }),
            ),
        ]);
        fixture.context.define_member(
            "save",
            Value::function("save", |store, _| {
                store.set("saved_by", "component")?;
                Ok(Value::Undefined)
            }),
        );
        let button = fixture.mount("<button></button>");
        fixture.apply(button, "@click", "save");
        click(&fixture, button);
        assert_eq!(fixture.store.get_untracked("saved_by"), Value::from("component"));

        // Call expressions still resolve through normal lookup.
        fixture.apply(button, "@click", "save()");
        fixture.store.set("saved_by", Value::Null).unwrap();
        click(&fixture, button);
        assert_eq!(fixture.store.get_untracked("saved_by"), Value::from("store"));
    }

    #[test]
    fn listeners_go_away_with_the_context() {
        let fixture = Fixture::new([("count", Value::from(0))]);
        let button = fixture.mount("<button></button>");
        fixture.apply(button, "@click", "count += 1");
        fixture.apply(button, "@click", "count = count + 1");
        assert_eq!(fixture.document().listener_count(button), 2);

        fixture.context.dispose();
        assert_eq!(fixture.document().listener_count(button), 0);
        click(&fixture, button);
        assert_eq!(fixture.store.get_untracked("count"), Value::from(0));
    }
}

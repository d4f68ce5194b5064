//! `x-show`: toggle `display: none`.

use super::DirectiveArgs;
use crate::error::ReactiveError;
use crate::reactive::Cleanup;

pub(super) fn show(args: &DirectiveArgs) -> Option<Cleanup> {
    let initial = args.document().style(args.node, "display");
    let binding = args.clone();
    args.effect(move || {
        let display = if binding.get().is_truthy() {
            initial.as_deref()
        } else {
            Some("none")
        };
        binding
            .document()
            .set_style(binding.node, "display", display)
            .map_err(|err| ReactiveError::EffectFailed(err.to_string()))
    });
    None
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

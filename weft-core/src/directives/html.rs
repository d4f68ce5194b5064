//! `x-html`: replace an element's children with markup.

use super::DirectiveArgs;
use crate::error::ReactiveError;
use crate::reactive::Cleanup;

pub(super) fn html(args: &DirectiveArgs) -> Option<Cleanup> {
    let binding = args.clone();
    args.effect(move || {
        let markup = binding.get().to_display_string();
        binding
            .document()
            .set_inner_html(binding.node, &markup)
            .map_err(|err| ReactiveError::EffectFailed(err.to_string()))
    });
    None
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

//! `x-text` and `{{ }}` interpolation: render an expression as text.

use super::DirectiveArgs;
use crate::error::ReactiveError;
use crate::reactive::Cleanup;

pub(super) fn text(args: &DirectiveArgs) -> Option<Cleanup> {
    let binding = args.clone();
    args.effect(move || {
        let text = binding.get().to_display_string();
        binding
            .document()
            .set_text_content(binding.node, &text)
            .map_err(|err| ReactiveError::EffectFailed(err.to_string()))
    });
    None
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

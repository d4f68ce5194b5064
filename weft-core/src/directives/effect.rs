//! `x-effect`: run an expression whenever what it reads changes.
//!
//! When the expression evaluates to a function (`x-effect="logCount"`), the
//! function is called inside the effect.

use super::DirectiveArgs;
use crate::error::ReactiveError;
use crate::reactive::Cleanup;
use crate::value::Value;

pub(super) fn effect(args: &DirectiveArgs) -> Option<Cleanup> {
    let binding = args.clone();
    args.effect(move || -> Result<(), ReactiveError> {
        if let Value::Function(f) = binding.try_get()? {
            f.call(&binding.store, &[])?;
        }
        Ok(())
    });
    None
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

//! `x-ref`: name an element on its component.

use tracing::warn;

use super::DirectiveArgs;
use crate::reactive::Cleanup;

pub(super) fn reference(args: &DirectiveArgs) -> Option<Cleanup> {
    let name = args.exp.trim();
    if name.is_empty() {
        warn!(node = args.node.raw(), "x-ref without a name");
        return None;
    }
    args.context.set_ref(name, args.node);
    None
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

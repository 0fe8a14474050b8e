//! The plugin pipeline contract.
//!
//! A plugin is a self-contained extension registered once at editor
//! construction. Its capabilities are the fixed set of trait methods below,
//! each with a default no-op implementation; the editor state invokes
//! plugins in registration order and never probes for anything beyond this
//! interface.

use scribe_core::Tendril;

use crate::{
  state::EditorState,
  transaction::Transaction,
};

/// Outcome of a plugin's look at a proposed transaction.
#[derive(Debug)]
pub enum FilterResult {
  /// Let the transaction through unchanged.
  Keep,
  /// Substitute a different transaction; remaining plugins filter the
  /// replacement.
  Replace(Transaction),
  /// Drop the whole transaction. No later plugin sees it and the editor
  /// state is unchanged.
  Reject(Tendril),
}

/// A range-based view annotation derived from state, recomputed after each
/// commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoration {
  pub from:  usize,
  pub to:    usize,
  pub class: Tendril,
}

/// A pure function from state to a producible transaction; `None` means not
/// applicable in the current state.
pub type Command = fn(&EditorState) -> Option<Transaction>;

/// One entry of a plugin's keymap.
#[derive(Clone, Copy)]
pub struct KeyBinding {
  pub key:     &'static str,
  pub command: Command,
}

pub trait Plugin {
  fn name(&self) -> &str;

  /// Inspect a proposed transaction before commit.
  fn filter_transaction(&self, _tr: &Transaction, _state: &EditorState) -> FilterResult {
    FilterResult::Keep
  }

  /// Key bindings contributed by this plugin. The first applicable binding
  /// across all plugins, in registration order, wins.
  fn keymap(&self) -> &[KeyBinding] {
    &[]
  }

  /// Derived view state for the current document.
  fn decorations(&self, _state: &EditorState) -> Vec<Decoration> {
    Vec::new()
  }
}

#[cfg(test)]
mod test {
  use super::*;

  struct Bare;

  impl Plugin for Bare {
    fn name(&self) -> &str {
      "bare"
    }
  }

  #[test]
  fn defaults_are_inert() {
    let plugin = Bare;
    assert_eq!(plugin.name(), "bare");
    assert!(plugin.keymap().is_empty());
  }
}

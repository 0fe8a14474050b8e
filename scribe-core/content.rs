//! Content expressions: the grammar constraining a node type's children.
//!
//! An expression is a whitespace-separated sequence of terms. Each term is a
//! type or group name, or a parenthesized alternation `(a | b)`, optionally
//! followed by a repetition marker:
//!
//! - `paragraph` - exactly one paragraph
//! - `block*` - zero or more nodes in the `block` group
//! - `list_item+` - one or more list items
//! - `caption?` - an optional caption
//! - `(paragraph | heading) block*` - sequencing
//!
//! Expressions are compiled once per node type when the schema is built and
//! then consulted by every node construction and every structural edit via
//! [`ContentExpr::matches`].

use thiserror::Error;

use crate::{
  Tendril,
  schema::NodeType,
};

pub type Result<T> = std::result::Result<T, ContentExprError>;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContentExprError {
  #[error("empty alternation in content expression {expr:?}")]
  EmptyAlternation { expr: String },
  #[error("unbalanced parenthesis in content expression {expr:?}")]
  UnbalancedParen { expr: String },
  #[error("repetition marker {marker:?} without a preceding term in {expr:?}")]
  DanglingMarker { marker: char, expr: String },
}

/// How many times a term may match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
  One,
  /// `?`
  Optional,
  /// `*`
  Many,
  /// `+`
  AtLeastOne,
}

/// A single term: one or more alternative type/group names plus a repetition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
  pub choices: Vec<Tendril>,
  pub repeat:  Repeat,
}

impl Term {
  fn fits(&self, child: &NodeType) -> bool {
    self
      .choices
      .iter()
      .any(|name| *name == child.name || child.groups.iter().any(|g| g == name))
  }
}

/// A compiled content expression.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentExpr {
  terms: Vec<Term>,
}

impl ContentExpr {
  /// Compile an expression string. The referenced names are resolved against
  /// the schema later, during [`Schema::define`](crate::schema::Schema).
  pub fn compile(expr: &str) -> Result<Self> {
    let mut terms = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(&c) = chars.peek() {
      match c {
        c if c.is_whitespace() => {
          chars.next();
        },
        '(' => {
          chars.next();
          let mut choices = Vec::new();
          let mut name = String::new();
          loop {
            match chars.next() {
              Some(')') => {
                if !name.trim().is_empty() {
                  choices.push(Tendril::from(name.trim()));
                }
                break;
              },
              Some('|') => {
                if name.trim().is_empty() {
                  return Err(ContentExprError::EmptyAlternation { expr: expr.into() });
                }
                choices.push(Tendril::from(name.trim()));
                name.clear();
              },
              Some(c) => name.push(c),
              None => return Err(ContentExprError::UnbalancedParen { expr: expr.into() }),
            }
          }
          if choices.is_empty() {
            return Err(ContentExprError::EmptyAlternation { expr: expr.into() });
          }
          terms.push(Term {
            choices,
            repeat: Repeat::One,
          });
        },
        '*' | '+' | '?' => {
          chars.next();
          let repeat = match c {
            '*' => Repeat::Many,
            '+' => Repeat::AtLeastOne,
            _ => Repeat::Optional,
          };
          match terms.last_mut() {
            Some(term) if term.repeat == Repeat::One => term.repeat = repeat,
            _ => return Err(ContentExprError::DanglingMarker { marker: c, expr: expr.into() }),
          }
        },
        ')' | '|' => {
          return Err(ContentExprError::UnbalancedParen { expr: expr.into() });
        },
        _ => {
          let mut name = String::new();
          while let Some(&c) = chars.peek() {
            if c.is_whitespace() || matches!(c, '(' | ')' | '|' | '*' | '+' | '?') {
              break;
            }
            name.push(c);
            chars.next();
          }
          terms.push(Term {
            choices: vec![Tendril::from(name.as_str())],
            repeat:  Repeat::One,
          });
        },
      }
    }

    Ok(Self { terms })
  }

  /// Every type or group name referenced by this expression.
  pub fn referenced_names(&self) -> impl Iterator<Item = &Tendril> {
    self.terms.iter().flat_map(|t| t.choices.iter())
  }

  /// Whether a concrete child type sequence is legal for this expression.
  pub fn matches(&self, children: &[&NodeType]) -> bool {
    self.match_from(0, children, 0)
  }

  /// Whether an empty child list is legal.
  pub fn matches_empty(&self) -> bool {
    self.matches(&[])
  }

  fn match_from(&self, term: usize, children: &[&NodeType], child: usize) -> bool {
    let Some(t) = self.terms.get(term) else {
      return child == children.len();
    };
    let fits_here = || child < children.len() && t.fits(children[child]);

    match t.repeat {
      Repeat::One => fits_here() && self.match_from(term + 1, children, child + 1),
      Repeat::Optional => {
        self.match_from(term + 1, children, child)
          || (fits_here() && self.match_from(term + 1, children, child + 1))
      },
      Repeat::Many => self.match_many(term, children, child),
      Repeat::AtLeastOne => fits_here() && self.match_many(term, children, child + 1),
    }
  }

  /// `*` semantics for `term`: consume zero or more fitting children, then
  /// move on. Backtracks on failure.
  fn match_many(&self, term: usize, children: &[&NodeType], child: usize) -> bool {
    let t = &self.terms[term];
    self.match_from(term + 1, children, child)
      || (child < children.len()
        && t.fits(children[child])
        && self.match_many(term, children, child + 1))
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn expr(s: &str) -> ContentExpr {
    ContentExpr::compile(s).unwrap()
  }

  #[test]
  fn compile_terms() {
    let e = expr("paragraph block*");
    assert_eq!(e.terms.len(), 2);
    assert_eq!(e.terms[0].repeat, Repeat::One);
    assert_eq!(e.terms[1].repeat, Repeat::Many);

    let e = expr("(paragraph | heading)+");
    assert_eq!(e.terms.len(), 1);
    assert_eq!(e.terms[0].choices.len(), 2);
    assert_eq!(e.terms[0].repeat, Repeat::AtLeastOne);
  }

  #[test]
  fn compile_errors() {
    assert!(matches!(
      ContentExpr::compile("*"),
      Err(ContentExprError::DanglingMarker { marker: '*', .. })
    ));
    assert!(matches!(
      ContentExpr::compile("(a | b"),
      Err(ContentExprError::UnbalancedParen { .. })
    ));
    assert!(matches!(
      ContentExpr::compile("( | a)"),
      Err(ContentExprError::EmptyAlternation { .. })
    ));
    // A marker cannot apply twice to one term.
    assert!(matches!(
      ContentExpr::compile("a*?"),
      Err(ContentExprError::DanglingMarker { marker: '?', .. })
    ));
  }

  #[test]
  fn empty_matching() {
    assert!(expr("inline*").matches_empty());
    assert!(expr("block?").matches_empty());
    assert!(!expr("block+").matches_empty());
    assert!(!expr("paragraph").matches_empty());
  }
}

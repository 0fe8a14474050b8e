use smartstring::{
  LazyCompact,
  SmartString,
};

pub mod basic;
pub mod content;
pub mod dom;
pub mod node;
pub mod position;
pub mod replace;
pub mod schema;

pub type Tendril = SmartString<LazyCompact>;

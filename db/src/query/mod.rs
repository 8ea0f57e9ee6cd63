//! Filter/sort compilation.
//!
//! Client-supplied `filter[...]` and `sort` parameters are checked against a
//! static [`FieldRegistry`] and compiled into a [`Predicate`] AST plus an
//! ordered list of [`OrderKey`]s. The AST is rendered to parameterized SQL by
//! [`render`] and can also be evaluated in memory with
//! [`Predicate::matches`].

mod compile;
mod fields;
pub mod keyset;
mod predicate;
pub mod render;

pub use compile::*;
pub use fields::*;
pub use predicate::*;

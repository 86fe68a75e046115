//! Sorted first-order belief sets: syntax, construction, sort inference, and
//! materialization.
//!
//! - [`syntax`]: the engine's ASCII formula syntax and Unicode normalization
//! - [`builder`]: [`FormulaBuilder`], the mutable belief set under construction
//! - [`hierarchy`]: is-a inference between sorts and constant typing
//! - [`materialize`]: emission of builder state to the reasoning engine

pub mod builder;
pub mod hierarchy;
pub mod materialize;
pub mod syntax;

pub use builder::{Formula, FormulaBuilder, FormulaShape, PredicateSchema, Sort};
pub use hierarchy::{SortHierarchy, SortResolution};
pub use materialize::{BeliefSetDeclarations, BeliefSetMaterializer, MaterializedBeliefSet};
pub use syntax::{FolDocument, unicode_to_ascii};

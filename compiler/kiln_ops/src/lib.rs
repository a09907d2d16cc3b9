//! Operation helper name registry for the Kiln compiler.
//!
//! For every binary operator (in binary and in-place form) and every rich
//! comparison this crate derives two ordered sets of runtime helper
//! identifiers:
//!
//! - **specialized**: helpers with dedicated, non-dispatching bodies;
//! - **non-specialized**: combinations known to occur that use the generic
//!   object path.
//!
//! The sets are derived from declarative [`OperatorDescriptor`] tables by
//! pure rule application ([`derive`]), then collected into the read-only
//! [`HelperRegistry`] which also answers helper selection for operation
//! sites.

mod derive;
mod descriptor;
mod error;
mod helper_id;
mod helper_set;
mod registry;
mod tables;

pub use derive::{derive_comparison, derive_inplace, derive_operation, DerivedSets};
pub use descriptor::{
    format_combination_supported, is_commutative_eligible, ComparisonDescriptor, Friends,
    InplaceRule, OperatorDescriptor, SameType, COMMUTATIVE_ELIGIBLE, OBJECT, OBJECT_NBOOL,
    OBJECT_NILONG,
};
pub use error::TableError;
pub use helper_id::{HelperId, HelperKind};
pub use helper_set::HelperSet;
pub use registry::{HelperRegistry, HelperSelection, SetKind};
pub use tables::{comparison_descriptor, operator_descriptor, operator_descriptors};

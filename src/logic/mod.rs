pub mod dirty;
pub mod identity;
pub mod translate;
pub mod validate;

pub use dirty::{attribute_changes, canonical, is_dirty, AttributeChanges, CanonicalRecord};
pub use translate::{RecordRef, ReferenceValidation};
pub use validate::validate_record;

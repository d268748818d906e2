pub mod attribute;
pub mod behavior;
pub mod common;
pub mod entity;
pub mod module;
pub mod record;

pub use attribute::{Attribute, AttributeField, AttributeType};
pub use behavior::*;
pub use common::*;
pub use entity::*;
pub use module::*;
pub use record::*;

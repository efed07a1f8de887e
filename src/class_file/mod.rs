//! Data model of the class file format: the constant pool, class/field/method structures,
//! attributes, and the version header. Everything here knows how to write itself out with
//! [`Serialize`](crate::binary::Serialize) and read itself back with
//! [`Deserialize`](crate::binary::Deserialize) (or the `parse_with_pool` variants for structures
//! whose decoding needs the constant pool).

mod attribute;
mod class;
mod constants;
mod field;
mod method;
mod version;

pub use attribute::*;
pub use class::*;
pub use constants::*;
pub use field::*;
pub use method::*;
pub use version::*;

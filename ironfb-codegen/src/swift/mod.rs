//! Swift code generation modules.

pub mod enums;
pub mod layout;
pub mod lookup;
pub mod tables;
pub mod types;

pub use enums::EnumGenerator;
pub use layout::LayoutGenerator;
pub use lookup::KeyLookupGenerator;
pub use tables::RecordGenerator;
pub use types::TypeMapper;

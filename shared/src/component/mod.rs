pub mod component;
pub mod component_kind;
pub mod filter;

pub mod base;
pub mod dynamic;
pub mod label;
pub mod macros;
pub mod manager;
pub mod marker;
pub mod vector;

//! Value types shared by conditions, contexts and items

pub mod value;

pub use value::Value;

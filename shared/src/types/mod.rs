//! Core data types

pub mod series;
pub mod value;
pub mod variable;

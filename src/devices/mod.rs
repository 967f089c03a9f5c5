//! Device implementations

pub mod particulate;
pub mod secure_module;

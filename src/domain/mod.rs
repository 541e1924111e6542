//! Domain model of the approval workflow

pub mod constant;
pub mod context;
pub mod error;
pub mod project;
pub mod state;

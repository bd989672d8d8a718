//! API Routes

pub mod sensors;

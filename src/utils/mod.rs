//! Shared helpers

pub mod socket;

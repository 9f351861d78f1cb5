//! Templates and the named views the composer resolves.

pub mod views;

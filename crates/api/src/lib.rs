//! Admin HTTP surface and process wiring for the sync engine.

pub mod app;

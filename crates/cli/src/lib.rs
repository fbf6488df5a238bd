//! Command-line front end for selscope.

pub mod commands;

pub mod app;
pub mod artifacts;
pub mod commands;
pub mod compile;
pub mod env;
pub mod output;
pub mod run;
pub mod runtime;

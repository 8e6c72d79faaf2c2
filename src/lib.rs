pub mod actuator;
pub mod config;
pub mod control;
pub mod drive;
pub mod messages;
pub mod runtime;
pub mod supervisor;

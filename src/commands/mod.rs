// Command implementations for the ts-setup CLI

pub mod clean;
pub mod detect;
pub mod info;
pub mod install;

#![forbid(unsafe_code)]

pub mod actions;
pub mod app;
pub mod ascii;
pub mod commands;
pub mod config;
pub mod error;
pub mod fancy;
pub mod fs_ops;
pub mod ignore;
pub mod input;
pub mod model;
pub mod session;
pub mod term;
pub mod tree;
pub mod ui;
pub mod watch;

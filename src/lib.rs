//! Declarative local host configuration runner.
//!
//! A playbook is a TOML file of steps, each invoking a named task such as
//! `fs.mkdir` or `core.run`. Tasks are idempotent: they report whether they
//! changed anything, and changed results can notify handlers that run once
//! at the end of the playbook.
//!
//! The public API is organised into layers:
//!
//! - **[`config`]**: parse, validate and discover playbook files
//! - **[`engine`]**: run context, argument binding, templating and outcomes
//! - **[`resources`]**: idempotent `check + apply` file-system primitives
//! - **[`tasks`]**: the built-in `core` and `fs` task catalogue
//! - **[`runner`]**: turn playbook steps into task invocations
//! - **[`commands`]**: top-level orchestration (`run`, `list`, `completions`)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod exec;
pub mod logging;
pub mod platform;
pub mod resources;
pub mod runner;
pub mod tasks;

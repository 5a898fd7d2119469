//! Runtime module: process lifecycle: logging, config, toolbox.

pub mod boot;

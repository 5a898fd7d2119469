// Module structure for the schema inference tool layer.

// Core
pub mod parser;
pub mod guard;
pub mod handles;
pub mod schema;
pub mod error;

// Tool surface
pub mod files;
pub mod toolbox;

// Process lifecycle
pub mod runtime;
pub mod conf;

// Application layer modules
pub mod application;

// Wiring shared by the binaries
pub mod bootstrap;

// Domain layer modules
pub mod domain;

// Infrastructure layer modules
pub mod infrastructure;

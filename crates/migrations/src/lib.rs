pub mod artifacts;
pub mod chain;
pub mod config;
pub mod deployer;
pub mod migration;
pub mod runner;

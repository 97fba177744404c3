pub mod bootstrap;
pub mod commands;
pub mod insight_service;

pub mod insight_cache;
pub mod models;
pub mod periods;
pub mod time_grid;

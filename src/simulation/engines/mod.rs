pub mod activity_engine;
pub mod leg_engine;

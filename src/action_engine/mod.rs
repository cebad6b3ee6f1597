pub mod capture_sequence;
pub mod click_sequence;
pub mod engine;
pub mod event_bus;
pub mod loop_control;
pub mod sequence;
pub mod state;

pub mod sample_source;
pub mod sample_window;
pub mod symbol_sync;

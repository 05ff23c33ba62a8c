pub mod mru;
pub mod picker;
pub mod press;
pub mod recording;
pub mod search;
pub mod window_cycle;

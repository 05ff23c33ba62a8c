//! Boundary to whatever draws the picker.

pub use crate::model::picker::{PickerFlags, PickerView};

/// Draws the picker. Calls arrive on the engine task and must not block.
///
/// User intent flows back only as key events and clicks posted to the engine.
pub trait Presenter {
    fn show(&mut self, view: &PickerView);
    fn update(&mut self, view: &PickerView);
    fn hide(&mut self);
    /// Brief confirmation such as "Quit Safari", shown over the open picker.
    fn show_transient_message(&mut self, text: &str);
}

pub mod actor;
pub mod common;
pub mod model;
pub mod replay;
pub mod sys;
pub mod ui;

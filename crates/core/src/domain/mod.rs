pub mod action;
pub mod result;

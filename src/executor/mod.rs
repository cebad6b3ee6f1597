pub mod input;
pub mod text_input;

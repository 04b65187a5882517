pub mod chat;
pub mod generate;
pub mod splitter;
pub mod validate;

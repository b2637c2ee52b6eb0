pub mod inject;
pub mod print;

pub mod errors;
pub mod info;
pub mod simulate;

pub mod length;
pub mod track;

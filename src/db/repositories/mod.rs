pub mod records;
pub mod roster;

pub mod excuses;
pub mod roster;

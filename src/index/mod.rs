pub mod bwt;
pub mod fm;
pub mod pack;
pub mod sa;

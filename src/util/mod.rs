mod offset;

pub use offset::*;

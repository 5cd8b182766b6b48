pub mod sounds;
pub mod status;

pub use sounds::*;
pub use status::*;

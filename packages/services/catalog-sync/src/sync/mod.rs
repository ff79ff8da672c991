pub mod batch;
pub mod engine;
pub mod indexes;
pub mod key_index;

pub use batch::*;
pub use engine::*;
pub use indexes::*;
pub use key_index::*;

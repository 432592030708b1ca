pub mod check;
pub mod config;
pub mod inspect;
pub mod stage;

pub use check::*;
pub use config::*;
pub use inspect::*;
pub use stage::*;

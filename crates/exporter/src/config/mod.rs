pub mod cli;
pub mod devices;

pub use cli::*;
pub use devices::*;

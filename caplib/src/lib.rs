mod client;
pub use client::*;

mod device;
pub use device::*;

pub mod caparoc;
pub mod protocol;
pub mod registers;
pub mod simulator;

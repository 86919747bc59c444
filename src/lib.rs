#![no_std]
#[cfg(feature = "std")]
extern crate std;

#[cfg(feature = "device")]
mod mutex;
mod utils;


pub mod protocol;
pub mod ring;
#[cfg(feature = "host")]
pub mod host;
#[cfg(feature = "device")]
pub mod device;

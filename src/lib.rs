//! Drivers for serial bus servos.
//!
//! This crate talks to two families of servos over a half-duplex serial bus:
//! Futaba RS30x servos with the short packet protocol ([`Futaba`]),
//! and Dynamixel servos with protocol 2.0 ([`RobotisP20`]).
//! Both implement [`ServoDriver`], so application code can be written once for either bus.
//!
//! Every driver runs a background thread that sends queued commands one at a time
//! and collects their responses.
//! Getters return a [`Query`] that can be resolved in three ways:
//! ```no_run
//! # fn main() -> Result<(), gs2d::Error> {
//! use gs2d::{RobotisP20, ServoDriver};
//!
//! let driver = RobotisP20::open("/dev/ttyUSB0", 115_200)?;
//!
//! // Block until the value arrives.
//! let degrees = driver.get_current_position(1).wait()?;
//!
//! // Receive the value in a callback on another thread.
//! driver.get_temperature(1).on_reply(|temperature| println!("{:?}", temperature))?;
//!
//! // Or await it.
//! let voltage = futures::executor::block_on(async { driver.get_voltage(1).await })?;
//! # let _ = (degrees, voltage);
//! # Ok(())
//! # }
//! ```

#[macro_use]
mod log;

pub mod burst;
pub mod bytestuff;
pub mod crc;
pub mod driver;
pub mod endian;
pub mod protocol;
pub mod transport;

mod completion;
mod config;
mod dispatcher;
mod error;

pub use completion::{Query, Reply};
pub use config::Config;
pub use driver::{BurstPosition, BurstReply, Futaba, PingResponse, RobotisP20, ServoDriver};
pub use error::*;
pub use transport::Transport;

#[cfg(feature = "serial2")]
pub use transport::SerialTransport;

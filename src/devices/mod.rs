pub mod arduino;

pub use arduino::{ArduinoError, PortEntry, SerialSettings};

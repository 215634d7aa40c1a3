use thiserror::Error;

pub type Result<T, E = BusError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("no device with index {0}")]
    NoSuchDevice(u8),
    #[error("device {device} has no channel {channel}")]
    NoSuchChannel { device: u8, channel: u8 },
    #[error("no acknowledge from address 0x{0:02X}")]
    Nack(u8),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("operation not supported on this backend: {0}")]
    Unsupported(&'static str),
}

use libftd2xx::FtStatus;
use thiserror::Error;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_GENERAL_ERROR: i32 = 1;
pub const EXIT_INVALID_ARGUMENTS: i32 = 6;

/// Every failure a command can end in. Each variant owns one slot of the
/// exit-code contract; front ends map errors to codes with [`Error::exit_code`]
/// and never by matching message text.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0:#}")]
    Unclassified(#[from] anyhow::Error),

    #[error("No FTDI devices found")]
    NoDevicesFound,

    #[error("Device '{0}' not found")]
    DeviceNotFound(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(FtStatus),

    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Device disconnected unexpectedly")]
    DeviceDisconnected,

    #[error("Permission denied opening device")]
    PermissionDenied,

    #[error("Device in use by another application")]
    DeviceInUse,

    #[error("Invalid relay number: {0}. Must be 1-{1}")]
    InvalidRelayNumber(i64, u8),

    #[error("Conflicting flags: {0}")]
    ConflictingFlags(String),

    #[error("FTDI driver error: {0}")]
    Driver(FtStatus),
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Unclassified(_) => EXIT_GENERAL_ERROR,
            Error::NoDevicesFound => 2,
            Error::DeviceNotFound(_) => 3,
            Error::ConnectionFailed(_) => 4,
            Error::CommandFailed(_) => 5,
            Error::InvalidArguments(_) => EXIT_INVALID_ARGUMENTS,
            Error::DeviceDisconnected => 7,
            Error::PermissionDenied => 8,
            Error::DeviceInUse => 9,
            Error::InvalidRelayNumber(_, _) => 10,
            Error::ConflictingFlags(_) => 11,
            Error::Driver(_) => 12,
        }
    }
}

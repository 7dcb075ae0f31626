//! FTDI adapter enumeration and the bit-bang transport boundary.
//!
//! Everything that talks to the D2XX driver lives here. The rest of the
//! crate sees [`BitBang`], a trait narrow enough for tests to script a fake
//! device, and the [`Error`] taxonomy instead of raw driver statuses.

use libftd2xx::BitMode;
use libftd2xx::FtStatus;
use libftd2xx::Ftdi;
use libftd2xx::FtdiCommon;
use libftd2xx::TimeoutError;
use log::debug;
use log::info;

use crate::error::Error;

/// Baud rate for bit-bang clocking, as the boards expect.
pub const BAUD_RATE: u32 = 9600;

/// One attached adapter, as reported by a single enumeration pass.
/// Descriptors are produced fresh each time and never cached: the index is
/// only the position in that pass, the serial is the stable identity.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeviceDescriptor {
    pub index: usize,
    pub serial: String,
    pub description: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Selector {
    /// Position in a fresh enumeration. Hot-plugging reorders indices
    /// between enumerations; that instability comes with the driver layer
    /// and is not papered over by caching old indices.
    ByIndex(usize),
    /// Stable hardware identity.
    BySerial(String),
}

/// List currently attached adapters. Zero devices is an empty list, not an
/// error; a driver fault is.
pub fn list() -> Result<Vec<DeviceDescriptor>, Error> {
    let infos = libftd2xx::list_devices().map_err(Error::Driver)?;
    let devices: Vec<DeviceDescriptor> = infos
        .into_iter()
        .enumerate()
        .map(|(index, info)| DeviceDescriptor {
            index,
            serial: info.serial_number,
            description: info.description,
        })
        .collect();
    debug!("Found {} FTDI device(s)", devices.len());
    Ok(devices)
}

/// Resolve a selector against one enumeration pass. Pure; no open attempt
/// is made, so selector mistakes fail before any I/O.
pub fn resolve<'a>(
    devices: &'a [DeviceDescriptor],
    selector: &Selector,
) -> Result<&'a DeviceDescriptor, Error> {
    if devices.is_empty() {
        return Err(Error::NoDevicesFound);
    }
    match selector {
        Selector::ByIndex(index) => devices
            .get(*index)
            .ok_or_else(|| Error::DeviceNotFound(format!("index {}", index))),
        Selector::BySerial(serial) => devices
            .iter()
            .find(|device| device.serial == *serial)
            .ok_or_else(|| Error::DeviceNotFound(serial.clone())),
    }
}

/// Enumerate, resolve, open. Open failures are classified from the D2XX
/// status code, never from message text.
pub fn open(selector: &Selector) -> Result<(Ftdi, DeviceDescriptor), Error> {
    let devices = list()?;
    let descriptor = resolve(&devices, selector)?.clone();
    info!(
        "Connecting to {} (serial: {})",
        descriptor.description, descriptor.serial
    );
    // An adapter the driver cannot fully query reports an empty serial;
    // fall back to opening by enumeration position.
    let opened = match descriptor.serial.is_empty() {
        true => Ftdi::with_index(descriptor.index as i32),
        false => Ftdi::with_serial_number(&descriptor.serial),
    };
    match opened {
        Ok(handle) => Ok((handle, descriptor)),
        Err(status) => Err(classify_open(status, &descriptor.serial)),
    }
}

/// D2XX collapses most open failures into a handful of statuses; each mapped
/// status gets exactly one exit condition, the rest stay driver errors.
fn classify_open(status: FtStatus, identity: &str) -> Error {
    match status {
        FtStatus::DEVICE_NOT_FOUND => Error::DeviceNotFound(String::from(identity)),
        FtStatus::DEVICE_NOT_OPENED => Error::DeviceInUse,
        FtStatus::INSUFFICIENT_RESOURCES => Error::PermissionDenied,
        FtStatus::INVALID_HANDLE | FtStatus::IO_ERROR => Error::ConnectionFailed(status),
        other => Error::Driver(other),
    }
}

/// A status on the read/write path that says the device is gone.
pub(crate) fn classify_io(status: FtStatus) -> Error {
    match status {
        FtStatus::DEVICE_NOT_FOUND
        | FtStatus::DEVICE_NOT_OPENED
        | FtStatus::INVALID_HANDLE
        | FtStatus::IO_ERROR => Error::DeviceDisconnected,
        other => Error::CommandFailed(other.to_string()),
    }
}

/// Write failures: a transaction timeout counts as a disconnect (USB
/// timeouts are the driver's concern; by the time one surfaces here the
/// device is not answering).
pub(crate) fn classify_write(error: TimeoutError) -> Error {
    match error {
        TimeoutError::Timeout { .. } => Error::DeviceDisconnected,
        TimeoutError::FtStatus(status) => classify_io(status),
    }
}

/// The operations the session drives on an open adapter. Implemented by the
/// D2XX handle, and by scripted fakes in tests.
pub trait BitBang {
    fn set_baud_rate(&mut self, baud: u32) -> Result<(), FtStatus>;
    fn set_bit_mode(&mut self, mask: u8, mode: BitMode) -> Result<(), FtStatus>;
    /// Instantaneous pin state: the latched output register.
    fn bit_mode(&mut self) -> Result<u8, FtStatus>;
    fn write_all(&mut self, buf: &[u8]) -> Result<(), TimeoutError>;
    fn close(&mut self) -> Result<(), FtStatus>;
}

impl BitBang for Ftdi {
    fn set_baud_rate(&mut self, baud: u32) -> Result<(), FtStatus> {
        FtdiCommon::set_baud_rate(self, baud)
    }

    fn set_bit_mode(&mut self, mask: u8, mode: BitMode) -> Result<(), FtStatus> {
        FtdiCommon::set_bit_mode(self, mask, mode)
    }

    fn bit_mode(&mut self) -> Result<u8, FtStatus> {
        FtdiCommon::bit_mode(self)
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), TimeoutError> {
        FtdiCommon::write_all(self, buf)
    }

    fn close(&mut self) -> Result<(), FtStatus> {
        FtdiCommon::close(self)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn attached() -> Vec<DeviceDescriptor> {
        vec![
            DeviceDescriptor {
                index: 0,
                serial: String::from("A1B2C3"),
                description: String::from("USB <-> Serial"),
            },
            DeviceDescriptor {
                index: 1,
                serial: String::from("D4E5F6"),
                description: String::from("USB <-> Serial"),
            },
        ]
    }

    #[test]
    fn resolve_by_serial() {
        let devices = attached();
        let device = match resolve(&devices, &Selector::BySerial(String::from("D4E5F6"))) {
            Ok(device) => device,
            Err(e) => panic!("expected a match: {}", e),
        };
        assert_eq!(device.index, 1);
    }

    #[test]
    fn resolve_unknown_serial_is_device_not_found() {
        let devices = attached();
        match resolve(&devices, &Selector::BySerial(String::from("NOPE"))) {
            Err(Error::DeviceNotFound(serial)) => assert_eq!(serial, "NOPE"),
            other => panic!("expected DeviceNotFound, got {:?}", other),
        }
    }

    #[test]
    fn resolve_index_out_of_range_is_device_not_found() {
        let devices = attached();
        match resolve(&devices, &Selector::ByIndex(2)) {
            Err(Error::DeviceNotFound(_)) => {}
            other => panic!("expected DeviceNotFound, got {:?}", other),
        }
    }

    #[test]
    fn resolve_with_nothing_attached_is_no_devices() {
        for selector in [
            Selector::ByIndex(0),
            Selector::BySerial(String::from("A1B2C3")),
        ] {
            match resolve(&[], &selector) {
                Err(Error::NoDevicesFound) => {}
                other => panic!("expected NoDevicesFound, got {:?}", other),
            }
        }
    }

    #[test]
    fn open_status_classification() {
        assert_eq!(classify_open(FtStatus::DEVICE_NOT_OPENED, "X").exit_code(), 9);
        assert_eq!(
            classify_open(FtStatus::INSUFFICIENT_RESOURCES, "X").exit_code(),
            8
        );
        assert_eq!(classify_open(FtStatus::IO_ERROR, "X").exit_code(), 4);
        assert_eq!(classify_open(FtStatus::DEVICE_NOT_FOUND, "X").exit_code(), 3);
        assert_eq!(classify_open(FtStatus::OTHER_ERROR, "X").exit_code(), 12);
    }

    #[test]
    fn io_status_classification() {
        assert_eq!(classify_io(FtStatus::DEVICE_NOT_FOUND).exit_code(), 7);
        assert_eq!(classify_io(FtStatus::IO_ERROR).exit_code(), 7);
        assert_eq!(classify_io(FtStatus::OTHER_ERROR).exit_code(), 5);
        let timeout = TimeoutError::Timeout {
            actual: 0,
            expected: 1,
        };
        assert_eq!(classify_write(timeout).exit_code(), 7);
    }
}

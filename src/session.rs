//! One open connection to one adapter.
//!
//! Lifecycle is `Closed -> Opening -> Open (bit-bang configured) -> Closed`,
//! with no way back from `Closed` except a fresh [`Session::open`]. The
//! handle is owned exclusively for the session's lifetime; `close` is
//! idempotent and also runs on drop, so it can never leak.

use libftd2xx::BitMode;
use libftd2xx::Ftdi;
use log::debug;
use log::info;
use log::warn;

use crate::error::Error;
use crate::ftdi;
use crate::ftdi::BitBang;
use crate::ftdi::Selector;

pub struct Session<D: BitBang> {
    device: Option<D>,
    configured: bool,
}

impl Session<Ftdi> {
    pub fn open(selector: &Selector) -> Result<Session<Ftdi>, Error> {
        let (device, _descriptor) = ftdi::open(selector)?;
        info!("Device connected");
        Ok(Session::attach(device))
    }
}

impl<D: BitBang> Session<D> {
    /// Wrap an already-open transport; tests use this with a scripted device.
    pub fn attach(device: D) -> Session<D> {
        Session {
            device: Some(device),
            configured: false,
        }
    }

    /// Switch the adapter into asynchronous bit-bang mode with the low
    /// `channel_count` pins as outputs. Required before any read or write.
    /// On failure the handle is closed before the error propagates.
    pub fn configure_bitbang(&mut self, channel_count: u8) -> Result<(), Error> {
        let pin_mask = ((1u16 << channel_count) - 1) as u8;
        debug!("Setting baud rate to {}", ftdi::BAUD_RATE);
        if let Err(status) = self.device_mut()?.set_baud_rate(ftdi::BAUD_RATE) {
            self.close();
            return Err(Error::Driver(status));
        }
        debug!("Setting bit bang mode, pin mask 0x{:02X}", pin_mask);
        if let Err(status) = self
            .device_mut()?
            .set_bit_mode(pin_mask, BitMode::AsyncBitbang)
        {
            self.close();
            return Err(Error::Driver(status));
        }
        self.configured = true;
        Ok(())
    }

    /// The latched output register. A device that has never been written
    /// since power-on reports a driver-defined value here, possibly 0,
    /// possibly not; it is used as-is, with no all-OFF assumption.
    pub fn read_output(&mut self) -> Result<u8, Error> {
        debug_assert!(self.device.is_none() || self.configured);
        let byte = self.device_mut()?.bit_mode().map_err(ftdi::classify_io)?;
        debug!("Read relay state: 0x{:02X}", byte);
        Ok(byte)
    }

    /// Write the whole output register in one transaction; bits change
    /// together or not at all.
    pub fn write_output(&mut self, byte: u8) -> Result<(), Error> {
        debug_assert!(self.device.is_none() || self.configured);
        debug!("Writing relay state: 0x{:02X}", byte);
        self.device_mut()?
            .write_all(&[byte])
            .map_err(ftdi::classify_write)?;
        Ok(())
    }

    /// Idempotent; safe to call on every exit path.
    pub fn close(&mut self) {
        if let Some(mut device) = self.device.take() {
            match device.close() {
                Ok(()) => info!("Device disconnected"),
                Err(status) => warn!("Error during disconnect: {}", status),
            }
        }
        self.configured = false;
    }

    fn device_mut(&mut self) -> Result<&mut D, Error> {
        self.device.as_mut().ok_or(Error::DeviceDisconnected)
    }
}

impl<D: BitBang> Drop for Session<D> {
    fn drop(&mut self) {
        self.close();
    }
}

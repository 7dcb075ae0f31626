use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::ArgAction;
use clap::Parser;
use log::error;
use log::info;
use log::warn;

use ftdi_relay_ctl::compose::OperationRequest;
use ftdi_relay_ctl::compose::RawRequest;
use ftdi_relay_ctl::engine;
use ftdi_relay_ctl::error;
use ftdi_relay_ctl::error::Error;
use ftdi_relay_ctl::ftdi;
use ftdi_relay_ctl::ftdi::DeviceDescriptor;
use ftdi_relay_ctl::ftdi::Selector;
use ftdi_relay_ctl::interrupt;
use ftdi_relay_ctl::relay_state::RelayState;
use ftdi_relay_ctl::relay_state::MAX_CHANNELS;
use ftdi_relay_ctl::settings;
use ftdi_relay_ctl::settings::Settings;

/// Control FTDI bit-bang relay boards (SainSmart 4-relay and compatible).
///
/// Exit codes: 0=success, 1=general error, 2=no devices, 3=device not
/// found, 4=connection failed, 5=command failed, 6=invalid arguments,
/// 7=disconnected, 8=permission denied, 9=device in use, 10=invalid relay,
/// 11=conflicting flags, 12=driver error.
#[derive(Debug, Parser)]
#[command(name = "ftdi-relay-ctl", version)]
struct Args {
    /// List available FTDI devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Connect to device by enumeration index (0-based)
    #[arg(long, value_name = "INDEX", conflicts_with = "device_serial")]
    device_index: Option<usize>,

    /// Connect to device by serial number
    #[arg(long, value_name = "SERIAL")]
    device_serial: Option<String>,

    /// Set absolute state: listed relays ON, all others OFF
    #[arg(short = 's', long, num_args = 0.., value_name = "RELAY", allow_negative_numbers = true)]
    state: Option<Vec<i64>>,

    /// Turn on relays, leave others unchanged
    #[arg(long, num_args = 1.., value_name = "RELAY", allow_negative_numbers = true)]
    on: Vec<i64>,

    /// Turn off relays, leave others unchanged
    #[arg(long, num_args = 1.., value_name = "RELAY", allow_negative_numbers = true)]
    off: Vec<i64>,

    /// Toggle relays, leave others unchanged
    #[arg(short = 't', long, num_args = 1.., value_name = "RELAY", allow_negative_numbers = true)]
    toggle: Vec<i64>,

    /// Pulse relays on, then restore the previous state
    #[arg(short = 'm', long, num_args = 1.., value_name = "RELAY", allow_negative_numbers = true)]
    momentary: Vec<i64>,

    /// Momentary pulse length in seconds (default from settings, 0.5)
    #[arg(short = 'd', long, value_name = "SECONDS", allow_negative_numbers = true)]
    duration: Option<f64>,

    /// Suppress informational output; errors are still reported
    #[arg(short, long)]
    quiet: bool,

    /// Show detailed execution information (repeat for trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Use an alternate settings file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version land here too; only real parse errors
            // take the invalid-arguments exit code
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => error::EXIT_SUCCESS,
                _ => error::EXIT_INVALID_ARGUMENTS,
            };
            let _ = e.print();
            process::exit(code);
        }
    };
    process::exit(run(&args));
}

fn run(args: &Args) -> i32 {
    let settings = settings::load(args.config.as_deref());

    let quiet = args.quiet || settings.quiet;
    let mut verbosity = 2 + usize::from(args.verbose);
    if settings.verbose {
        verbosity = verbosity.max(3);
    }
    if quiet {
        verbosity = 0;
    }
    if let Err(e) = stderrlog::new()
        .module(module_path!())
        .verbosity(verbosity.min(4))
        .timestamp(stderrlog::Timestamp::Off)
        .init()
    {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }

    interrupt::install();

    match real_main(args, &settings, quiet) {
        Ok(()) => error::EXIT_SUCCESS,
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    }
}

fn real_main(args: &Args, settings: &Settings, quiet: bool) -> Result<(), Error> {
    let width = settings.channel_count;
    if width < 1 || width > MAX_CHANNELS {
        return Err(Error::InvalidArguments(format!(
            "channel_count {} out of range 1-{}",
            width, MAX_CHANNELS
        )));
    }

    if args.list_devices {
        return list_devices_command();
    }

    let raw = RawRequest {
        state: args.state.clone(),
        on: args.on.clone(),
        off: args.off.clone(),
        toggle: args.toggle.clone(),
        momentary: args.momentary.clone(),
        duration: args.duration,
    };
    // fails with the specific relay/flag exit condition before any device I/O
    let request = OperationRequest::validate(&raw, width, settings.default_duration)?;

    let selector = match select_device(args)? {
        Some(selector) => selector,
        None => {
            info!("Exiting without connecting");
            return Ok(());
        }
    };

    let mut observer = |state: &RelayState| {
        if !quiet {
            println!("Relay state: {}", state);
        }
    };
    let result = engine::run(&selector, &request, &mut observer)?;

    if request.is_empty() && !quiet {
        println!("Relay state: {}", result);
    }
    if !quiet {
        println!("Command executed successfully.");
    }

    remember_device(&selector, settings, args.config.as_deref());
    Ok(())
}

fn list_devices_command() -> Result<(), Error> {
    let devices = ftdi::list()?;
    if devices.is_empty() {
        return Err(Error::NoDevicesFound);
    }
    println!("Available FTDI devices:");
    for device in &devices {
        println!(
            "  [{}] {} (serial: {})",
            device.index, device.description, device.serial
        );
    }
    Ok(())
}

/// Turn the device flags into a selector. Without flags: a single attached
/// device is used directly, several prompt the user, none is an error.
/// `Ok(None)` means the user chose not to connect.
fn select_device(args: &Args) -> Result<Option<Selector>, Error> {
    if let Some(serial) = &args.device_serial {
        return Ok(Some(Selector::BySerial(serial.clone())));
    }
    if let Some(index) = args.device_index {
        return Ok(Some(Selector::ByIndex(index)));
    }
    let devices = ftdi::list()?;
    match devices.len() {
        0 => Err(Error::NoDevicesFound),
        1 => Ok(Some(selector_for(&devices[0]))),
        _ => prompt_for_device(&devices),
    }
}

fn selector_for(device: &DeviceDescriptor) -> Selector {
    // an empty serial means the driver could not read the EEPROM; the
    // enumeration index is all there is to go on
    match device.serial.is_empty() {
        true => Selector::ByIndex(device.index),
        false => Selector::BySerial(device.serial.clone()),
    }
}

fn prompt_for_device(devices: &[DeviceDescriptor]) -> Result<Option<Selector>, Error> {
    println!("Multiple FTDI devices found:");
    for device in devices {
        println!(
            "  [{}] {} (serial: {})",
            device.index, device.description, device.serial
        );
    }
    println!("  [X] Exit without connecting");
    loop {
        print!("Select device [0-{}, X]: ", devices.len() - 1);
        io::stdout().flush().context("flush prompt")?;
        let mut line = String::new();
        let read = io::stdin()
            .read_line(&mut line)
            .context("read device selection")?;
        if read == 0 {
            eprintln!("No input available; use --device-index or --device-serial in scripts");
            return Ok(None);
        }
        let choice = line.trim();
        if choice.eq_ignore_ascii_case("x") {
            return Ok(None);
        }
        match choice.parse::<usize>() {
            Ok(index) if index < devices.len() => return Ok(Some(selector_for(&devices[index]))),
            _ => println!(
                "Enter a number between 0 and {}, or X to exit",
                devices.len() - 1
            ),
        }
    }
}

/// Record the serial of the device we connected to, as the settings-file
/// default for tools that want it. Failure to save never fails the command.
fn remember_device(selector: &Selector, settings: &Settings, config: Option<&Path>) {
    let serial = match selector {
        Selector::BySerial(serial) => serial,
        _ => return,
    };
    if settings.last_device.as_deref() == Some(serial.as_str()) {
        return;
    }
    let mut updated = settings.clone();
    updated.last_device = Some(serial.clone());
    if let Err(e) = settings::save(&updated, config) {
        warn!("Failed to save settings: {:#}", e);
    }
}

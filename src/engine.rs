//! The execution engine: one command, one session, single pass, no retries.
//!
//! Each step either succeeds or the whole command aborts; the output
//! register write is atomic, so a multi-relay command is never partially
//! applied. The session is closed on every path out.

use log::debug;
use log::info;

use crate::compose;
use crate::compose::OperationRequest;
use crate::error::Error;
use crate::ftdi::BitBang;
use crate::ftdi::Selector;
use crate::interrupt;
use crate::relay_state::RelayState;
use crate::session::Session;

/// Called with the fresh [`RelayState`] after every successful write. The
/// CLI prints it; a GUI front end would update its widgets from here
/// instead of polling the hardware.
pub type StateObserver<'a> = &'a mut dyn FnMut(&RelayState);

pub fn run(
    selector: &Selector,
    request: &OperationRequest,
    observer: StateObserver<'_>,
) -> Result<RelayState, Error> {
    let mut session = Session::open(selector)?;
    let result = drive(&mut session, request, observer);
    session.close();
    result
}

fn drive<D: BitBang>(
    session: &mut Session<D>,
    request: &OperationRequest,
    observer: StateObserver<'_>,
) -> Result<RelayState, Error> {
    session.configure_bitbang(request.width())?;
    let current = RelayState::from_byte(session.read_output()?, request.width());
    debug!("Current state: {}", current);

    if request.is_empty() {
        info!("No relay operation requested; state left unchanged");
        return Ok(current);
    }

    let plan = compose::compose(current, request);
    session.write_output(plan.immediate.to_byte())?;
    observer(&plan.immediate);

    match plan.restore {
        None => Ok(plan.immediate),
        Some((delay, restore)) => {
            debug!("Holding pulse for {:.3}s", delay.as_secs_f64());
            let completed = interrupt::sleep_interruptible(delay);
            // The restore write is owed even when the wait was cut short;
            // the board must not be left in the pulsed state.
            session.write_output(restore.to_byte())?;
            observer(&restore);
            if !completed {
                info!("Interrupted; previous relay state restored");
            }
            Ok(restore)
        }
    }
}

use std::time::Duration;

use crate::error::Error;
use crate::relay_state::RelayState;

/// Relay flags exactly as the front end collected them, before any
/// validation. Channel numbers stay signed so that `0`, negatives and
/// out-of-range values all reach the validator instead of dying in parsing.
#[derive(Clone, Debug, Default)]
pub struct RawRequest {
    /// `--state`: absolute state, listed relays ON and all others OFF.
    /// `Some(vec![])` is a valid request meaning "everything OFF".
    pub state: Option<Vec<i64>>,
    pub on: Vec<i64>,
    pub off: Vec<i64>,
    pub toggle: Vec<i64>,
    pub momentary: Vec<i64>,
    pub duration: Option<f64>,
}

/// A validated command. Constructing one through [`OperationRequest::validate`]
/// is the only way in, and it happens before any device I/O: a request that
/// fails validation never opens a session.
#[derive(Clone, Debug, PartialEq)]
pub struct OperationRequest {
    width: u8,
    absolute: Option<u8>,
    on: u8,
    off: u8,
    toggle: u8,
    momentary: Option<Pulse>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pulse {
    pub mask: u8,
    pub duration: Duration,
}

impl OperationRequest {
    pub fn validate(
        raw: &RawRequest,
        width: u8,
        default_duration: f64,
    ) -> Result<OperationRequest, Error> {
        let absolute = match &raw.state {
            Some(channels) => Some(mask_of(channels, width)?),
            None => None,
        };
        let on = mask_of(&raw.on, width)?;
        let off = mask_of(&raw.off, width)?;
        let toggle = mask_of(&raw.toggle, width)?;
        let momentary_mask = mask_of(&raw.momentary, width)?;

        if absolute.is_some() && (on | off | toggle) != 0 {
            return Err(Error::ConflictingFlags(String::from(
                "--state cannot be used with --on, --off, or --toggle",
            )));
        }
        if on & off != 0 {
            return Err(Error::ConflictingFlags(format!(
                "relay(s) {} in both --on and --off",
                channel_list(on & off)
            )));
        }
        if (on | off) & toggle != 0 {
            return Err(Error::ConflictingFlags(format!(
                "relay(s) {} in both --toggle and --on/--off",
                channel_list((on | off) & toggle)
            )));
        }
        if raw.duration.is_some() && raw.momentary.is_empty() {
            return Err(Error::ConflictingFlags(String::from(
                "--duration can only be used with --momentary",
            )));
        }

        let momentary = match raw.momentary.is_empty() {
            true => None,
            false => {
                let seconds = raw.duration.unwrap_or(default_duration);
                if !seconds.is_finite() || seconds < 0.0 {
                    return Err(Error::InvalidArguments(format!(
                        "duration must be a non-negative number of seconds, got {}",
                        seconds
                    )));
                }
                Some(Pulse {
                    mask: momentary_mask,
                    duration: Duration::from_secs_f64(seconds),
                })
            }
        };

        Ok(OperationRequest {
            width,
            absolute,
            on,
            off,
            toggle,
            momentary,
        })
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    /// True when no relay operation was requested at all. The engine still
    /// opens and reads, but writes nothing.
    pub fn is_empty(&self) -> bool {
        self.absolute.is_none()
            && self.on == 0
            && self.off == 0
            && self.toggle == 0
            && self.momentary.is_none()
    }
}

/// The engine's write plan: one byte now, and for momentary requests the
/// pre-pulse state to put back once the duration has elapsed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ComposedWrite {
    pub immediate: RelayState,
    pub restore: Option<(Duration, RelayState)>,
}

/// Fold a request into the state read from the device.
///
/// Relative sets apply off, then on, then toggle. Validation keeps the three
/// sets disjoint, so the order cannot change the outcome; it is fixed here so
/// there is exactly one documented behavior. The momentary restore target is
/// the state computed by everything else in the same request, not all-OFF.
pub fn compose(current: RelayState, request: &OperationRequest) -> ComposedWrite {
    debug_assert!(current.width() == request.width);
    let base = match request.absolute {
        Some(mask) => current.with_absolute(mask),
        None => current
            .with_mask_off(request.off)
            .with_mask_on(request.on)
            .with_mask_toggled(request.toggle),
    };
    match request.momentary {
        Some(pulse) => ComposedWrite {
            immediate: base.with_mask_on(pulse.mask),
            restore: Some((pulse.duration, base)),
        },
        None => ComposedWrite {
            immediate: base,
            restore: None,
        },
    }
}

fn mask_of(channels: &[i64], width: u8) -> Result<u8, Error> {
    let mut mask = 0u8;
    for &channel in channels {
        if channel < 1 || channel > i64::from(width) {
            return Err(Error::InvalidRelayNumber(channel, width));
        }
        mask |= 1 << (channel - 1);
    }
    Ok(mask)
}

fn channel_list(mask: u8) -> String {
    let channels: Vec<String> = (1..=8)
        .filter(|channel| mask & (1 << (channel - 1)) != 0)
        .map(|channel| channel.to_string())
        .collect();
    channels.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(raw: &RawRequest) -> OperationRequest {
        match OperationRequest::validate(raw, 4, 0.5) {
            Ok(request) => request,
            Err(e) => panic!("expected valid request: {}", e),
        }
    }

    fn exit_code_of(raw: &RawRequest) -> i32 {
        match OperationRequest::validate(raw, 4, 0.5) {
            Ok(_) => panic!("expected validation failure"),
            Err(e) => e.exit_code(),
        }
    }

    #[test]
    fn on_set_from_all_off() {
        let raw = RawRequest {
            on: vec![1, 2],
            ..RawRequest::default()
        };
        let plan = compose(RelayState::from_byte(0b0000, 4), &request(&raw));
        assert_eq!(plan.immediate.to_byte(), 0b0011);
        assert_eq!(plan.restore, None);
    }

    #[test]
    fn absolute_forces_unnamed_channels_off() {
        let raw = RawRequest {
            state: Some(vec![2, 4]),
            ..RawRequest::default()
        };
        let plan = compose(RelayState::from_byte(0b0101, 4), &request(&raw));
        assert_eq!(plan.immediate.to_byte(), 0b1010);
    }

    #[test]
    fn absolute_is_idempotent() {
        let raw = RawRequest {
            state: Some(vec![1, 3]),
            ..RawRequest::default()
        };
        let req = request(&raw);
        let once = compose(RelayState::from_byte(0b1100, 4), &req).immediate;
        let twice = compose(once, &req).immediate;
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_absolute_set_means_all_off() {
        let raw = RawRequest {
            state: Some(vec![]),
            ..RawRequest::default()
        };
        let plan = compose(RelayState::from_byte(0b1111, 4), &request(&raw));
        assert_eq!(plan.immediate.to_byte(), 0b0000);
    }

    #[test]
    fn disjoint_sets_touch_only_named_channels() {
        let raw = RawRequest {
            on: vec![1],
            off: vec![2],
            toggle: vec![3],
            ..RawRequest::default()
        };
        let current = RelayState::from_byte(0b1110, 4);
        let result = compose(current, &request(&raw)).immediate;
        assert!(result.is_on(1));
        assert!(!result.is_on(2));
        assert!(!result.is_on(3));
        // channel 4 was never named
        assert_eq!(result.is_on(4), current.is_on(4));
    }

    #[test]
    fn momentary_restores_pre_pulse_state_not_all_off() {
        let raw = RawRequest {
            on: vec![1],
            momentary: vec![3],
            duration: Some(0.1),
            ..RawRequest::default()
        };
        let plan = compose(RelayState::from_byte(0b0000, 4), &request(&raw));
        assert_eq!(plan.immediate.to_byte(), 0b0101);
        let (delay, restore) = match plan.restore {
            Some(pair) => pair,
            None => panic!("expected a restore write"),
        };
        assert_eq!(delay, Duration::from_millis(100));
        // the state computed by the non-momentary part, with channel 1 ON
        assert_eq!(restore.to_byte(), 0b0001);
    }

    #[test]
    fn momentary_alone_reverts_to_current() {
        let raw = RawRequest {
            momentary: vec![3],
            duration: Some(0.1),
            ..RawRequest::default()
        };
        let plan = compose(RelayState::from_byte(0b0000, 4), &request(&raw));
        assert_eq!(plan.immediate.to_byte(), 0b0100);
        match plan.restore {
            Some((_, restore)) => assert_eq!(restore.to_byte(), 0b0000),
            None => panic!("expected a restore write"),
        }
    }

    #[test]
    fn upper_register_bits_pass_through_compose() {
        let raw = RawRequest {
            state: Some(vec![1]),
            ..RawRequest::default()
        };
        let plan = compose(RelayState::from_byte(0b1010_0110, 4), &request(&raw));
        assert_eq!(plan.immediate.to_byte(), 0b1010_0001);
    }

    #[test]
    fn channel_in_on_and_off_conflicts() {
        let raw = RawRequest {
            on: vec![1, 2],
            off: vec![2],
            ..RawRequest::default()
        };
        assert_eq!(exit_code_of(&raw), 11);
    }

    #[test]
    fn channel_in_on_and_toggle_conflicts() {
        let raw = RawRequest {
            on: vec![1],
            toggle: vec![1],
            ..RawRequest::default()
        };
        assert_eq!(exit_code_of(&raw), 11);
    }

    #[test]
    fn absolute_conflicts_with_relative_sets() {
        let raw = RawRequest {
            state: Some(vec![1]),
            toggle: vec![2],
            ..RawRequest::default()
        };
        assert_eq!(exit_code_of(&raw), 11);
    }

    #[test]
    fn duration_without_momentary_conflicts() {
        let raw = RawRequest {
            on: vec![1],
            duration: Some(2.0),
            ..RawRequest::default()
        };
        assert_eq!(exit_code_of(&raw), 11);
    }

    #[test]
    fn out_of_range_channels_are_invalid_relay_numbers() {
        for bad in [0i64, -1, 5, 99] {
            let raw = RawRequest {
                on: vec![bad],
                ..RawRequest::default()
            };
            assert_eq!(exit_code_of(&raw), 10, "channel {}", bad);
        }
    }

    #[test]
    fn channel_five_is_valid_on_an_eight_wide_board() {
        let raw = RawRequest {
            on: vec![5],
            ..RawRequest::default()
        };
        let req = match OperationRequest::validate(&raw, 8, 0.5) {
            Ok(request) => request,
            Err(e) => panic!("expected valid request: {}", e),
        };
        let plan = compose(RelayState::from_byte(0, 8), &req);
        assert_eq!(plan.immediate.to_byte(), 0b0001_0000);
    }

    #[test]
    fn negative_duration_is_invalid() {
        let raw = RawRequest {
            momentary: vec![1],
            duration: Some(-0.5),
            ..RawRequest::default()
        };
        assert_eq!(exit_code_of(&raw), 6);
    }

    #[test]
    fn momentary_uses_default_duration_when_unset() {
        let raw = RawRequest {
            momentary: vec![1],
            ..RawRequest::default()
        };
        let plan = compose(RelayState::from_byte(0, 4), &request(&raw));
        match plan.restore {
            Some((delay, _)) => assert_eq!(delay, Duration::from_millis(500)),
            None => panic!("expected a restore write"),
        }
    }

    #[test]
    fn empty_request_is_empty() {
        assert!(request(&RawRequest::default()).is_empty());
        let raw = RawRequest {
            state: Some(vec![]),
            ..RawRequest::default()
        };
        // "--state" with no relays is all-OFF, not a no-op
        assert!(!request(&raw).is_empty());
    }
}

//! Simulated board: the subsystems of a small I/O board backed by memory.
//!
//! - `/digitalout/<0..8>/value` (rw int), `/digitalout/<n>/active` (ro int)
//! - `/motor/<0..4>/speed` (rw int), `direction` (rw int), `active` (rw int)
//! - `/appled/state` (rw int), `/appled/brightness` (rw float)
//! - `/system/...` from [`SystemSubsystem`]
//!
//! Motor `n` drives digital outputs `2n` and `2n + 1` while active, and holds
//! them exclusively: writes to those outputs fail until the motor is released.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use oscwire_codec::Argument;
use oscwire_dispatch::{
    DispatchError, IdentityStore, Peripheral, PinArena, PinLease, PinMode, PropertyInfo, Registry,
    Result, Subsystem, SystemSubsystem, ValueType,
};
use tracing::debug;

pub const DIGITAL_OUTPUTS: usize = 8;
pub const MOTORS: usize = DIGITAL_OUTPUTS / 2;
pub const MAX_MOTOR_SPEED: i32 = 1023;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One digital output line.
#[derive(Debug, Default)]
pub struct OutputPin {
    pub level: bool,
}

impl Peripheral for OutputPin {}

pub type Pins = Arc<PinArena<OutputPin>>;

/// Build the full simulated registry.
pub fn registry(identity: Arc<IdentityStore>) -> Result<Registry> {
    let pins: Pins = PinArena::new((0..DIGITAL_OUTPUTS).map(|_| OutputPin::default()));
    Ok(Registry::builder()
        .with(SystemSubsystem::new(identity))?
        .with(DigitalOut::new(Arc::clone(&pins)))?
        .with(Motors::new(pins))?
        .with(AppLed::default())?
        .build())
}

fn int_flag(property: &str, value: &Argument) -> Result<bool> {
    match value.as_int() {
        Some(0) => Ok(false),
        Some(1) => Ok(true),
        _ => Err(DispatchError::InvalidValue {
            property: property.to_string(),
            reason: "expected 0 or 1".to_string(),
        }),
    }
}

fn unknown(subsystem: &str, property: &str) -> DispatchError {
    DispatchError::UnknownProperty {
        subsystem: subsystem.to_string(),
        property: property.to_string(),
    }
}

pub struct DigitalOut {
    pins: Pins,
}

impl DigitalOut {
    pub fn new(pins: Pins) -> Self {
        Self { pins }
    }
}

impl Subsystem for DigitalOut {
    fn name(&self) -> &str {
        "digitalout"
    }

    fn instance_count(&self) -> Option<usize> {
        Some(self.pins.len())
    }

    fn properties(&self) -> &[PropertyInfo] {
        const PROPS: &[PropertyInfo] = &[
            PropertyInfo::read_write("value", ValueType::Int),
            PropertyInfo::read_only("active", ValueType::Int),
        ];
        PROPS
    }

    fn get(&self, index: Option<usize>, property: &str) -> Result<Argument> {
        let channel = index.unwrap_or_default();
        match property {
            "value" => Ok(Argument::Int(
                self.pins.inspect(channel, |p| p.level).unwrap_or_default().into(),
            )),
            "active" => Ok(Argument::Int((self.pins.owners(channel) > 0).into())),
            other => Err(unknown("digitalout", other)),
        }
    }

    fn set(&self, index: Option<usize>, property: &str, value: Argument) -> Result<()> {
        if property != "value" {
            return Err(unknown("digitalout", property));
        }
        let level = value.as_int().unwrap_or_default() != 0;
        // Fails while a motor holds the channel.
        let lease = self.pins.acquire(index.unwrap_or_default(), PinMode::Shared)?;
        lease.with(|p| p.level = level);
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct MotorState {
    speed: i32,
    reverse: bool,
}

pub struct Motors {
    pins: Pins,
    state: Mutex<[MotorState; MOTORS]>,
    leases: Mutex<Vec<Option<[PinLease<OutputPin>; 2]>>>,
}

impl Motors {
    pub fn new(pins: Pins) -> Self {
        Self {
            pins,
            state: Mutex::new([MotorState::default(); MOTORS]),
            leases: Mutex::new((0..MOTORS).map(|_| None).collect()),
        }
    }

    fn drive(leases: &[PinLease<OutputPin>; 2], state: MotorState) {
        let running = state.speed > 0;
        leases[0].with(|p| p.level = running && !state.reverse);
        leases[1].with(|p| p.level = running && state.reverse);
    }

    fn activate(&self, motor: usize) -> Result<()> {
        let mut leases = lock(&self.leases);
        if leases[motor].is_some() {
            return Ok(());
        }
        let a = self.pins.acquire(2 * motor, PinMode::Exclusive)?;
        let b = self.pins.acquire(2 * motor + 1, PinMode::Exclusive)?;
        let pair = [a, b];
        Self::drive(&pair, lock(&self.state)[motor]);
        leases[motor] = Some(pair);
        debug!(motor, "motor active");
        Ok(())
    }

    fn deactivate(&self, motor: usize) {
        if let Some(pair) = lock(&self.leases)[motor].take() {
            for lease in &pair {
                lease.with(|p| p.level = false);
            }
            debug!(motor, "motor released");
        }
    }
}

impl Subsystem for Motors {
    fn name(&self) -> &str {
        "motor"
    }

    fn instance_count(&self) -> Option<usize> {
        Some(MOTORS)
    }

    fn properties(&self) -> &[PropertyInfo] {
        const PROPS: &[PropertyInfo] = &[
            PropertyInfo::read_write("speed", ValueType::Int),
            PropertyInfo::read_write("direction", ValueType::Int),
            PropertyInfo::read_write("active", ValueType::Int),
        ];
        PROPS
    }

    fn get(&self, index: Option<usize>, property: &str) -> Result<Argument> {
        let motor = index.unwrap_or_default();
        let state = lock(&self.state)[motor];
        match property {
            "speed" => Ok(Argument::Int(state.speed)),
            "direction" => Ok(Argument::Int(state.reverse.into())),
            "active" => Ok(Argument::Int(lock(&self.leases)[motor].is_some().into())),
            other => Err(unknown("motor", other)),
        }
    }

    fn set(&self, index: Option<usize>, property: &str, value: Argument) -> Result<()> {
        let motor = index.unwrap_or_default();
        match property {
            "active" => {
                if int_flag(property, &value)? {
                    self.activate(motor)
                } else {
                    self.deactivate(motor);
                    Ok(())
                }
            }
            "speed" | "direction" => {
                let state = {
                    let mut states = lock(&self.state);
                    let state = &mut states[motor];
                    if property == "speed" {
                        let speed = value.as_int().unwrap_or_default();
                        if !(0..=MAX_MOTOR_SPEED).contains(&speed) {
                            return Err(DispatchError::InvalidValue {
                                property: "speed".to_string(),
                                reason: format!("must be 0..={MAX_MOTOR_SPEED}"),
                            });
                        }
                        state.speed = speed;
                    } else {
                        state.reverse = int_flag(property, &value)?;
                    }
                    *state
                };
                if let Some(pair) = lock(&self.leases)[motor].as_ref() {
                    Self::drive(pair, state);
                }
                Ok(())
            }
            other => Err(unknown("motor", other)),
        }
    }
}

/// The board's status LED.
#[derive(Debug, Default)]
pub struct AppLed {
    state: Mutex<(bool, f32)>,
}

impl Subsystem for AppLed {
    fn name(&self) -> &str {
        "appled"
    }

    fn properties(&self) -> &[PropertyInfo] {
        const PROPS: &[PropertyInfo] = &[
            PropertyInfo::read_write("state", ValueType::Int),
            PropertyInfo::read_write("brightness", ValueType::Float),
        ];
        PROPS
    }

    fn get(&self, _index: Option<usize>, property: &str) -> Result<Argument> {
        let (on, brightness) = *lock(&self.state);
        match property {
            "state" => Ok(Argument::Int(on.into())),
            "brightness" => Ok(Argument::Float(brightness)),
            other => Err(unknown("appled", other)),
        }
    }

    fn set(&self, _index: Option<usize>, property: &str, value: Argument) -> Result<()> {
        let mut state = lock(&self.state);
        match property {
            "state" => state.0 = int_flag(property, &value)?,
            "brightness" => {
                let level = value.as_float().unwrap_or_default();
                if !(0.0..=1.0).contains(&level) {
                    return Err(DispatchError::InvalidValue {
                        property: "brightness".to_string(),
                        reason: "must be 0.0..=1.0".to_string(),
                    });
                }
                state.1 = level;
            }
            other => return Err(unknown("appled", other)),
        }
        Ok(())
    }
}

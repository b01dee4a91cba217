// lockstep-core/src/types/mod.rs

pub mod device;
pub mod tempo;

pub use device::{
    Callbacks, CallbackDevice, Device, DeviceHandle, DeviceSnapshot, DeviceSpec,
};
pub use tempo::{Multiplier, TempoMode};

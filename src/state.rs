use crate::answers::FirmwareVersion;
use crate::types::{MotorChannel, MotorPort, SensorChannel, SensorPort};

/// Last known values of the brick, kept on the host side.
///
/// The cache is only ever written by device commands and read synchronously
/// by the host; a failed or timed out query leaves it unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceState {
    pub motors: [MotorChannel; 3],
    pub sensors: [SensorChannel; 4],
    /// Last reported battery level in millivolts, 0 until queried.
    pub battery_millivolts: u16,
    pub firmware: Option<FirmwareVersion>,
}

impl DeviceState {
    /// Returns every channel to its power-on value.
    pub fn reset(&mut self) {
        *self = DeviceState::default();
    }

    #[inline]
    pub fn motor(&self, port: MotorPort) -> &MotorChannel {
        &self.motors[port.index() as usize]
    }

    #[inline]
    pub fn motor_mut(&mut self, port: MotorPort) -> &mut MotorChannel {
        &mut self.motors[port.index() as usize]
    }

    #[inline]
    pub fn sensor(&self, port: SensorPort) -> &SensorChannel {
        &self.sensors[port.index() as usize]
    }

    #[inline]
    pub fn sensor_mut(&mut self, port: SensorPort) -> &mut SensorChannel {
        &mut self.sensors[port.index() as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SensorKind;

    #[test]
    fn reset_clears_every_channel() {
        let mut state = DeviceState::default();
        state.motor_mut(MotorPort::B).power = -40;
        state.motor_mut(MotorPort::C).position = 720;
        state.sensor_mut(SensorPort::S3).kind = SensorKind::Light;
        state.sensor_mut(SensorPort::S3).value = 57;
        state.battery_millivolts = 7800;

        assert_eq!(state.motors[1].power, -40);
        assert_eq!(state.sensor(SensorPort::S3).value, 57);

        state.reset();
        assert_eq!(state, DeviceState::default());
        assert_eq!(state.sensor(SensorPort::S3).kind, SensorKind::None);
    }
}

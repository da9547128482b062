mod common;

use common::{ok, reply, SimulatedBrick};
use nxtlink::{
    CommandKind, Error, FirmwareVersion, MotorPort, SensorKind, SensorPort, SensorType,
};
use std::time::Duration;

fn output_state(port: u8, tacho_count: i32) -> Vec<u8> {
    let mut data = vec![port, 50, 0x05, 0x01, 0x00, 0x20];
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(&tacho_count.to_le_bytes());
    data.extend_from_slice(&0i32.to_le_bytes());
    data.extend_from_slice(&0i32.to_le_bytes());
    data
}

fn input_values(port: u8, raw: u16, scaled: i16) -> Vec<u8> {
    let mut data = vec![port, 1, 0, 0x05, 0x80];
    data.extend_from_slice(&raw.to_le_bytes());
    data.extend_from_slice(&raw.to_le_bytes());
    data.extend_from_slice(&scaled.to_le_bytes());
    data.extend_from_slice(&0i16.to_le_bytes());
    data
}

#[test]
fn motor_power_is_clamped_on_the_wire() {
    let (brick, device) = SimulatedBrick::connect(common::fast_options(), |_| None);

    device.set_motor_power(MotorPort::A, 150, true).unwrap();
    device.set_motor_power(MotorPort::A, -150, false).unwrap();

    let sent = brick.wait_for(0x04, 2);
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].kind, CommandKind::DirectNoReply);
    assert_eq!(sent[0].payload, vec![0, 100, 0x05, 0x01, 0, 0x20, 0, 0, 0, 0]);
    assert_eq!(sent[1].payload, vec![0, 0x9C, 0x01, 0x00, 0, 0x20, 0, 0, 0, 0]);
    assert_eq!(device.motor(MotorPort::A).power, -100);
}

#[test]
fn rotation_limit_and_stop() {
    let (brick, device) = SimulatedBrick::connect(common::fast_options(), |_| None);

    device.run_motor_for_degrees(MotorPort::B, -60, -360).unwrap();
    device.stop_motor(MotorPort::B, true).unwrap();
    device.stop_motor(MotorPort::C, false).unwrap();

    let sent = brick.wait_for(0x04, 3);
    assert_eq!(sent[0].payload, vec![1, 0xC4, 0x07, 0x01, 0, 0x20, 0x68, 0x01, 0, 0]);
    assert_eq!(sent[1].payload, vec![1, 0, 0x02, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(sent[2].payload, vec![2, 0, 0x00, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(device.motor(MotorPort::B).power, 0);
}

#[test]
fn motor_position_falls_back_to_cache() {
    let mut answered = false;
    let (brick, device) = SimulatedBrick::connect(common::fast_options(), move |request| {
        if request.opcode != 0x06 || answered {
            return None;
        }
        answered = true;
        ok(&output_state(request.payload[0], -720))
    });

    assert_eq!(device.get_motor_position(MotorPort::C), -720);
    assert_eq!(device.motor(MotorPort::C).position, -720);
    assert_eq!(brick.requests_for(0x06)[0].payload, vec![2]);

    // second query times out
    assert_eq!(device.get_motor_position(MotorPort::C), -720);
    assert_eq!(device.pending_count(), 0);

    device.reset_motor_position(MotorPort::C, false).unwrap();
    assert_eq!(brick.wait_for(0x0A, 1)[0].payload, vec![2, 0]);
    assert_eq!(device.motor(MotorPort::C).position, 0);
}

#[test]
fn battery_and_firmware_are_cached() {
    let (brick, device) = SimulatedBrick::connect(common::fast_options(), |request| {
        match request.opcode {
            0x0B => ok(&7800u16.to_le_bytes()),
            0x88 => ok(&[124, 1, 28, 1]),
            _ => None,
        }
    });

    assert_eq!(device.get_battery_level().unwrap(), Some(7800));
    assert_eq!(device.battery_millivolts(), 7800);

    let expected = FirmwareVersion {
        protocol_major: 1,
        protocol_minor: 124,
        firmware_major: 1,
        firmware_minor: 28,
    };
    assert_eq!(device.get_firmware_version().unwrap(), Some(expected));
    assert_eq!(device.state().firmware, Some(expected));
    assert_eq!(brick.requests_for(0x88)[0].kind, CommandKind::SystemWithReply);
}

#[test]
fn failure_status_is_reported() {
    let (_brick, device) =
        SimulatedBrick::connect(common::fast_options(), |_| reply(0xBE, &[]));

    match device.get_battery_level() {
        Err(Error::Status { opcode, status }) => {
            assert_eq!(opcode, 0x0B);
            assert_eq!(status.0, 0xBE);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(device.battery_millivolts(), 0);
    assert_eq!(device.pending_count(), 0);
}

#[test]
fn unanswered_request_times_out() {
    let (brick, device) = SimulatedBrick::connect(common::fast_options(), |_| None);

    let reply = device
        .send_and_wait(
            CommandKind::DirectWithReply,
            0x0B,
            &[],
            Duration::from_millis(50),
        )
        .unwrap();
    assert!(reply.is_none());
    assert_eq!(device.pending_count(), 0);
    assert_eq!(brick.requests_for(0x0B).len(), 1);
}

#[test]
fn late_reply_does_not_answer_the_next_request() {
    let mut calls = 0;
    let (brick, device) = SimulatedBrick::connect(common::fast_options(), move |request| {
        if request.opcode != 0x0B {
            return None;
        }
        calls += 1;
        if calls == 2 {
            ok(&8100u16.to_le_bytes())
        } else {
            None
        }
    });

    let first = device
        .get_battery_level_with_timeout(Duration::from_millis(200))
        .unwrap();
    assert_eq!(first, None);

    // the brick finally answers the first request
    brick.push(&[0x05, 0x00, 0x02, 0x0B, 0x00, 0x10, 0x1B]);
    assert_eq!(device.get_battery_level().unwrap(), Some(8100));
}

#[test]
fn concurrent_requests_get_their_own_replies() {
    let (_brick, device) = SimulatedBrick::connect(common::fast_options(), |request| {
        match request.opcode {
            0x0B => ok(&7600u16.to_le_bytes()),
            0x0D => ok(&600_000u32.to_le_bytes()),
            _ => None,
        }
    });

    std::thread::scope(|scope| {
        let battery = scope.spawn(|| {
            (0..20)
                .map(|_| device.get_battery_level().unwrap())
                .collect::<Vec<_>>()
        });
        let sleep = scope.spawn(|| {
            (0..20)
                .map(|_| device.keep_alive().unwrap())
                .collect::<Vec<_>>()
        });
        assert!(battery.join().unwrap().iter().all(|b| *b == Some(7600)));
        assert!(sleep.join().unwrap().iter().all(|s| *s == Some(600_000)));
    });
    assert_eq!(device.pending_count(), 0);
}

#[test]
fn unconfigured_sensor_uses_cache() {
    let (brick, device) = SimulatedBrick::connect(common::fast_options(), |_| None);

    assert_eq!(device.get_sensor_value(SensorPort::S2), 0);
    assert_eq!(device.get_raw_sensor_value(SensorPort::S2), 0);
    assert!(brick.requests_for(0x07).is_empty());
}

#[test]
fn light_sensor_setup_and_reading() {
    let (brick, device) = SimulatedBrick::connect(common::fast_options(), |request| {
        match request.opcode {
            0x07 => ok(&input_values(request.payload[0], 0x0210, 57)),
            _ => None,
        }
    });

    device.setup_light_sensor(SensorPort::S3, true).unwrap();
    assert_eq!(brick.wait_for(0x05, 1)[0].payload, vec![2, 0x05, 0x80]);
    assert_eq!(brick.wait_for(0x08, 1)[0].payload, vec![2]);

    let sensor = device.sensor(SensorPort::S3);
    assert_eq!(sensor.kind, SensorKind::Light);
    assert_eq!(sensor.sensor_type, Some(SensorType::LightActive));

    assert_eq!(device.get_sensor_value(SensorPort::S3), 57);
    assert_eq!(device.get_raw_sensor_value(SensorPort::S3), 0x0210);
    assert_eq!(device.sensor(SensorPort::S3).value, 57);

    let values = device.get_input_values(SensorPort::S3).unwrap().unwrap();
    assert!(values.valid);
    assert_eq!(values.normalized_value, 0x0210);
}

#[test]
fn ultrasonic_distance_after_polling() {
    let mut polls = 0;
    let (brick, device) = SimulatedBrick::connect(common::fast_options(), move |request| {
        match request.opcode {
            0x0E => {
                polls += 1;
                match polls {
                    1 => reply(0x20, &[]),
                    2 => ok(&[0]),
                    _ => ok(&[1]),
                }
            }
            0x10 => {
                let mut data = vec![1, 42];
                data.resize(17, 0);
                ok(&data)
            }
            _ => None,
        }
    });

    device.setup_ultrasonic_sensor(SensorPort::S4).unwrap();
    assert_eq!(brick.wait_for(0x05, 1)[0].payload, vec![3, 0x0B, 0x00]);

    assert_eq!(device.get_ultrasonic_distance(SensorPort::S4), 42);
    assert_eq!(brick.requests_for(0x0F)[0].payload, vec![3, 2, 1, 0x02, 0x42]);
    assert_eq!(brick.requests_for(0x0E).len(), 3);
    assert_eq!(brick.requests_for(0x10).len(), 1);
    assert_eq!(device.sensor(SensorPort::S4).value, 42);
}

#[test]
fn ultrasonic_never_ready_skips_read() {
    let (brick, device) = SimulatedBrick::connect(common::fast_options(), |request| {
        match request.opcode {
            0x0E => ok(&[0]),
            0x10 => ok(&[1, 42]),
            _ => None,
        }
    });

    assert_eq!(device.get_ultrasonic_distance(SensorPort::S1), 255);
    assert_eq!(brick.requests_for(0x0E).len(), 8);
    assert!(brick.requests_for(0x10).is_empty());
}

#[test]
fn tone_and_messages() {
    let (brick, device) = SimulatedBrick::connect(common::fast_options(), |request| {
        match request.opcode {
            0x13 => ok(&[0, 3, b'h', b'i', 0]),
            _ => None,
        }
    });

    device.play_tone(50, 500).unwrap();
    device.stop_sound().unwrap();
    device.message_write(1, b"hi").unwrap();

    assert_eq!(brick.wait_for(0x03, 1)[0].payload, vec![0xC8, 0x00, 0xF4, 0x01]);
    assert_eq!(brick.wait_for(0x0C, 1)[0].payload, Vec::<u8>::new());
    assert_eq!(brick.wait_for(0x09, 1)[0].payload, vec![1, 3, b'h', b'i', 0]);

    let message = device.message_read(10, 0, true).unwrap();
    assert_eq!(message, Some(b"hi".to_vec()));
    assert_eq!(brick.requests_for(0x13)[0].payload, vec![10, 0, 1]);
}

#[test]
fn programs_start_and_stop() {
    let (brick, device) = SimulatedBrick::connect(common::fast_options(), |request| {
        match request.opcode {
            0x00 => ok(&[]),
            _ => None,
        }
    });

    assert!(device.start_program("demo.rxe").unwrap());
    let mut name = b"demo.rxe".to_vec();
    name.resize(20, 0);
    assert_eq!(brick.requests_for(0x00)[0].payload, name);

    assert!(!device
        .stop_program_with_timeout(Duration::from_millis(50))
        .unwrap());
}

#[test]
fn device_info_is_parsed() {
    let (_brick, device) = SimulatedBrick::connect(common::fast_options(), |request| {
        if request.opcode != 0x9B {
            return None;
        }
        let mut data = b"NXT".to_vec();
        data.resize(15, 0);
        data.extend_from_slice(&[0x00, 0x16, 0x53, 0x0A, 0x0B, 0x0C, 0x00]);
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.extend_from_slice(&45_000u32.to_le_bytes());
        ok(&data)
    });

    let info = device.get_device_info().unwrap().unwrap();
    assert_eq!(info.name, "NXT");
    assert_eq!(info.address_string(), "00:16:53:0A:0B:0C");
    assert_eq!(info.free_flash, 45_000);
}

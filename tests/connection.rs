use i2c_peripheral::bus::sim::{Reply, WriteFault};
use i2c_peripheral::{
    BusConnection, DeviceError, DeviceUuid, SimulatedPeripheral, UUID_LENGTH, UUID_REGISTER,
};
use std::io;
use std::time::Duration;

fn connect(sim: &SimulatedPeripheral) -> BusConnection<SimulatedPeripheral> {
    let handle = sim.clone();
    BusConnection::connect_with(0x50, 2, move |_| Ok(handle))
        .unwrap()
        .with_register_delay(Duration::ZERO)
}

#[test]
fn provisions_and_reads_back_identifier() {
    let sim = SimulatedPeripheral::new().with_version([0x00, 0x03]);
    let mut conn = connect(&sim);
    let uuid: DeviceUuid = core::array::from_fn(|i| (i as u8) * 0x11);

    assert_eq!(conn.version().unwrap(), [0x00, 0x03]);
    conn.write_uuid(&uuid).unwrap();
    assert_eq!(conn.uuid().unwrap(), uuid);
    assert_eq!(conn.identifier(), uuid);

    conn.close().unwrap();
    assert!(sim.is_closed());
}

#[test]
fn reads_factory_identifier() {
    let uuid: DeviceUuid = [0x42; UUID_LENGTH];
    let sim = SimulatedPeripheral::new().with_stored_uuid(uuid);
    let mut conn = connect(&sim);

    assert_eq!(conn.uuid().unwrap(), uuid);
    assert_eq!(sim.written(), vec![vec![UUID_REGISTER]; 8]);
}

#[test]
fn failed_provisioning_leaves_identifier_untouched() {
    let sim = SimulatedPeripheral::new()
        .with_write_fault(4, WriteFault::Fail(io::ErrorKind::BrokenPipe));
    let mut conn = connect(&sim);

    let err = conn.write_uuid(&[0xEE; UUID_LENGTH]).unwrap_err();
    assert!(matches!(err, DeviceError::PartialWrite { index: 3, .. }));
    assert_eq!(conn.identifier(), [0u8; UUID_LENGTH]);
}

#[test]
fn partial_uuid_converts_with_question_mark() {
    fn read_id(conn: &mut BusConnection<SimulatedPeripheral>) -> Result<DeviceUuid, DeviceError> {
        Ok(conn.uuid()?)
    }

    let sim = SimulatedPeripheral::new().with_replies([Reply::Fail(io::ErrorKind::TimedOut)]);
    let mut conn = connect(&sim);

    let err = read_id(&mut conn).unwrap_err();
    assert!(matches!(err, DeviceError::Io { op: "read", .. }));
}

#[test]
fn opening_missing_bus_is_open_error() {
    let result = BusConnection::open(0x48, 250);
    assert!(matches!(result, Err(DeviceError::Open { .. })));
}

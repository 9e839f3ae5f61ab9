#![cfg(feature = "cli")]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::Command;
use std::thread;
use std::time::Duration;

use stationlink_frame::{encode, HeaderVariant, RoutingKey};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "stationlink-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn frame(key: (u8, u8, u8), payload: &[u8]) -> Vec<u8> {
    encode(HeaderVariant::V2, RoutingKey::from(key), payload)
        .expect("frame should encode")
        .to_vec()
}

fn serial_payload(serial: &str) -> Vec<u8> {
    let mut payload = vec![0, 0, 0, 0, 13, 0, 1, 2];
    let mut text = serial.as_bytes().to_vec();
    text.resize(15, 0);
    payload.extend_from_slice(&text);
    payload
}

fn stationlink() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_stationlink"));
    cmd.env_remove("STATIONLINK_HOST")
        .env_remove("STATIONLINK_PORT")
        .env_remove("STATIONLINK_PRODUCT")
        .arg("--log-level")
        .arg("error");
    cmd
}

#[test]
fn decode_capture_prints_fields_as_json() {
    let dir = unique_temp_dir("decode");
    let capture = dir.join("capture.bin");

    let mut bytes = vec![0x00, 0xaa, 0x13];
    bytes.extend(frame((2, 32, 2), &[1, 0, 0, 0, 0, 4, 3, 2, 1, 81]));
    bytes.extend(frame((4, 32, 74), &[1]));
    bytes.extend(frame((9, 9, 9), &[0xde, 0xad]));
    std::fs::write(&capture, &bytes).expect("capture should be writable");

    let output = stationlink()
        .arg("--format")
        .arg("json")
        .arg("decode")
        .arg(&capture)
        .arg("--product")
        .arg("5")
        .output()
        .expect("decode should run");

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let records: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is JSON"))
        .collect();
    assert_eq!(records.len(), 3);

    assert_eq!(records[0]["event"], "frame");
    assert_eq!(records[0]["key"], "2:32:2");
    assert_eq!(records[0]["channel"], "pd");
    assert_eq!(records[0]["fields"]["battery_level"], 81);
    assert_eq!(records[0]["fields"]["pd_version"], "1.2.3.4");

    assert_eq!(records[1]["fields"]["fan_auto"], 1);

    assert!(records[2].get("channel").is_none());
    assert_eq!(records[2]["payload"], "dead");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn decode_without_frames_returns_60() {
    let dir = unique_temp_dir("garbage");
    let capture = dir.join("garbage.bin");
    std::fs::write(&capture, [0x13, 0x37, 0xaa]).expect("capture should be writable");

    let output = stationlink()
        .arg("decode")
        .arg(&capture)
        .output()
        .expect("decode should run");

    assert_eq!(output.status.code(), Some(60));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn decode_missing_file_fails() {
    let dir = unique_temp_dir("missing");
    let output = stationlink()
        .arg("decode")
        .arg(dir.join("absent.bin"))
        .output()
        .expect("decode should run");

    assert_eq!(output.status.code(), Some(1));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn probe_prints_serial_from_device() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let port = listener.local_addr().expect("local addr").port();

    let device = thread::spawn(move || {
        let (mut socket, _) = listener.accept().expect("probe should connect");
        socket
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("read timeout");
        let mut request = [0u8; 64];
        let n = socket.read(&mut request).expect("request should arrive");
        assert!(n >= 18);
        assert_eq!(&request[12..16], &[0x20, 2, 1, 65]);

        socket
            .write_all(&frame((11, 1, 65), &serial_payload("DAEBZ5ZE1234567")))
            .expect("reply should be written");
        let _ = socket.read(&mut request);
    });

    let output = stationlink()
        .arg("--format")
        .arg("json")
        .arg("probe")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(port.to_string())
        .output()
        .expect("probe should run");

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let record: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("probe output is JSON");
    assert_eq!(record["event"], "serial");
    assert_eq!(record["serial"], "DAEBZ5ZE1234567");
    assert_eq!(record["product"], 13);
    assert_eq!(record["product_name"], "DELTA Max");

    device.join().expect("device thread");
}

#[test]
fn probe_without_device_times_out_with_124() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        listener.local_addr().expect("local addr").port()
    };

    let output = stationlink()
        .arg("probe")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(port.to_string())
        .arg("--timeout")
        .arg("1s")
        .output()
        .expect("probe should run");

    assert_eq!(output.status.code(), Some(124));
}

#[test]
fn set_rejects_unsupported_setting_before_connecting() {
    let output = stationlink()
        .arg("set")
        .arg("127.0.0.1")
        .arg("--product")
        .arg("13")
        .arg("light")
        .arg("2")
        .output()
        .expect("set should run");

    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("set_light"));
}

#[test]
fn version_reports_package_version() {
    let output = stationlink()
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

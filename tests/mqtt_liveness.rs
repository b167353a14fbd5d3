//! Liveness of the MQTT adapter's blocking seams against a broker that
//! accepts the handshake and then stops servicing the connection.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};

use sensornode::adapters::mqtt::MqttPublisher;
use sensornode::app::ports::LinePublisher;

/// Answers the CONNECT with a CONNACK, then holds the socket open
/// without reading or writing anything else.
fn silent_broker() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = [0u8; 64];
        let _ = stream.read(&mut buf);
        stream.write_all(&[0x20, 0x02, 0x00, 0x00]).unwrap();
        let _ = stream.flush();
        thread::sleep(Duration::from_secs(8));
    });
    port
}

#[test]
fn dead_broker_never_stalls_publishing_or_shutdown() {
    let port = silent_broker();
    let mut publisher =
        MqttPublisher::connect(&format!("127.0.0.1:{port}"), "sensors/data", "liveness-test")
            .unwrap();

    // A tick's worth of lines many times over. The hand-off must stay
    // non-blocking even though nothing is being acknowledged; overflow
    // comes back as an error, never as a stall.
    let started = Instant::now();
    for n in 0..200 {
        let line = format!("temperature,location=i2c_1,node=gw1,sensor=HTU21 value={n}.00");
        let _ = publisher.publish(&line);
    }
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "publishing stalled after {:?}",
        started.elapsed()
    );

    // Operator interrupt path: shutdown must come back within its grace
    // period even though the broker will never answer the disconnect.
    let started = Instant::now();
    publisher.shutdown();
    assert!(
        started.elapsed() < Duration::from_secs(7),
        "shutdown stalled after {:?}",
        started.elapsed()
    );
}

//! MQTT publisher adapter (rumqttc, synchronous client).
//!
//! One persistent connection to the broker, opened once at startup. The
//! connection's event loop (keepalive pings, acknowledgements,
//! automatic reconnects) runs on a dedicated background thread, fully
//! decoupled from the poll loop's timing. Startup blocks until the first
//! ConnAck so that an unreachable broker is a fatal configuration-time
//! error, not a silent message sink.
//!
//! Hand-offs to the connection thread never block: a line that cannot
//! be queued (broker outage, full request queue) is dropped with a
//! warning, and shutdown gives the thread a bounded grace period before
//! detaching it. Undelivered lines are not buffered across outages; the
//! next tick produces fresh readings anyway.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, warn};
use rumqttc::{Client, Connection, ConnectionError, Event, MqttOptions, Outgoing, Packet, QoS};

use crate::app::ports::{LinePublisher, PublishError};

const MQTT_DEFAULT_PORT: u16 = 1883;
const KEEPALIVE: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);
/// How long shutdown waits for the connection thread before detaching.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
/// Outgoing request queue depth between poll loop and event loop.
const QUEUE_CAPACITY: usize = 32;

/// [`LinePublisher`] over a persistent broker connection.
pub struct MqttPublisher {
    client: Option<Client>,
    topic: String,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    done_rx: mpsc::Receiver<()>,
}

impl MqttPublisher {
    /// Connect and wait for the broker's ConnAck. Fails when the broker
    /// does not answer within [`CONNECT_TIMEOUT`]. `server` is a
    /// hostname or IP, with an optional `:port` suffix overriding the
    /// standard port.
    pub fn connect(server: &str, topic: &str, client_id: &str) -> anyhow::Result<Self> {
        let (host, port) = split_host_port(server)?;
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(KEEPALIVE);

        let (client, connection) = Client::new(options, QUEUE_CAPACITY);
        let (ready_tx, ready_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let loop_stop = Arc::clone(&stop);
        let worker = thread::Builder::new().name("mqtt-conn".into()).spawn(move || {
            connection_loop(connection, &ready_tx, &loop_stop);
            let _ = done_tx.send(());
        })?;

        match ready_rx.recv_timeout(CONNECT_TIMEOUT) {
            Ok(Ok(())) => info!("connected to MQTT broker {host}:{port}"),
            Ok(Err(detail)) => anyhow::bail!("MQTT connect to {server} failed: {detail}"),
            Err(_) => anyhow::bail!("MQTT connect to {server} timed out"),
        }

        Ok(Self {
            client: Some(client),
            topic: topic.to_owned(),
            stop,
            worker: Some(worker),
            done_rx,
        })
    }
}

fn split_host_port(server: &str) -> anyhow::Result<(&str, u16)> {
    match server.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| anyhow::anyhow!("bad port in MQTT server \"{server}\""))?;
            Ok((host, port))
        }
        None => Ok((server, MQTT_DEFAULT_PORT)),
    }
}

/// Drives the broker connection until a clean disconnect or a shutdown
/// request. Reconnects with a fixed backoff once the initial handshake
/// has succeeded; before that, the first error is reported back as
/// fatal.
fn connection_loop(
    mut connection: Connection,
    ready: &mpsc::Sender<Result<(), String>>,
    stop: &AtomicBool,
) {
    let mut handshaken = false;
    for event in connection.iter() {
        if stop.load(Ordering::SeqCst) {
            break;
        }
        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                if handshaken {
                    info!("MQTT reconnected");
                } else {
                    handshaken = true;
                    let _ = ready.send(Ok(()));
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
            Ok(_) => {}
            // Request channel closed: the publisher was dropped.
            Err(ConnectionError::RequestsDone) => break,
            Err(e) => {
                if !handshaken {
                    let _ = ready.send(Err(e.to_string()));
                    break;
                }
                warn!("MQTT connection error: {e} (retrying)");
                thread::sleep(RECONNECT_BACKOFF);
            }
        }
    }
}

impl LinePublisher for MqttPublisher {
    /// Non-blocking hand-off to the connection thread. A full request
    /// queue means the broker is not draining; the line is dropped and
    /// reported, and the poll loop keeps its cadence.
    fn publish(&mut self, line: &str) -> Result<(), PublishError> {
        let Some(client) = self.client.as_mut() else {
            return Err(PublishError {
                detail: "publisher already shut down".into(),
            });
        };
        client
            .try_publish(&self.topic, QoS::AtLeastOnce, false, line)
            .map_err(|e| PublishError {
                detail: format!("line dropped: {e}"),
            })
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(client) = self.client.take() {
            if let Err(e) = client.try_disconnect() {
                warn!("MQTT disconnect failed: {e}");
            }
            // Dropping the client closes the request channel, which
            // ends the connection iterator even mid-outage.
        }
        if let Some(worker) = self.worker.take() {
            match self.done_rx.recv_timeout(SHUTDOWN_GRACE) {
                Ok(()) => {
                    let _ = worker.join();
                }
                Err(_) => warn!("MQTT connection thread still busy, detaching"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_strings_carry_an_optional_port() {
        assert_eq!(split_host_port("broker.lan").unwrap(), ("broker.lan", 1883));
        assert_eq!(
            split_host_port("127.0.0.1:11883").unwrap(),
            ("127.0.0.1", 11883)
        );
        assert!(split_host_port("broker.lan:mqtt").is_err());
    }
}

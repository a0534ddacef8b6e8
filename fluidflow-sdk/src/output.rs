//! Output backends that forward published samples off the bus.

use std::future::Future;
use std::io;
use std::path::PathBuf;

use fluidflow_types::FlowSample;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bus::Bus;
use crate::config::OutputConfig;

/// Output destination for samples.
///
/// An output subscribes to a bus topic with [`Output::attach`] and forwards
/// every sample it receives. Delivery is best effort: a failing sink logs a
/// warning and keeps receiving.
#[derive(Debug)]
pub enum Output {
    /// Write the latest sample to a JSON file.
    ///
    /// The file is overwritten with each sample.
    File(PathBuf),

    /// Send samples to a TCP server.
    ///
    /// Each sample is sent as a newline-delimited JSON message over one
    /// connection, re-established on the next sample after a failure.
    Tcp(String),

    /// Send samples through a channel.
    ///
    /// Use `Output::channel()` to create this variant and get the receiver.
    Channel(mpsc::Sender<FlowSample>),

    /// Log each sample at info level.
    Log,
}

impl Output {
    /// Create a file output.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fluidflow_sdk::Output;
    ///
    /// let output = Output::file("flow.json");
    /// ```
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Output::File(path.into())
    }

    /// Create a TCP output.
    pub fn tcp(addr: impl Into<String>) -> Self {
        Output::Tcp(addr.into())
    }

    /// Create a channel output and return both the output and receiver.
    ///
    /// Samples are dropped rather than waited on when the channel is full.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<FlowSample>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Output::Channel(tx), rx)
    }

    /// Subscribe to `topic` and forward samples until the bus goes away or,
    /// for a channel output, the receiver is dropped.
    pub fn attach(self, bus: &Bus, topic: &str) -> JoinHandle<()> {
        self.attach_until(bus, topic, std::future::pending())
    }

    /// Like [`Output::attach`], but also detach once `until` resolves. The
    /// subscription is dropped at that point.
    pub fn attach_until<F>(self, bus: &Bus, topic: &str, until: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut rx = bus.subscribe(topic);
        let topic = topic.to_string();
        let mut sink = Sink {
            output: self,
            stream: None,
        };

        tokio::spawn(async move {
            tokio::pin!(until);
            loop {
                let received = tokio::select! {
                    _ = &mut until => break,
                    received = rx.recv() => received,
                };
                match received {
                    Ok(sample) => {
                        if sink.is_closed() {
                            break;
                        }
                        if let Err(e) = sink.emit(&sample).await {
                            tracing::warn!(topic = %topic, output = sink.describe(), error = %e, "failed to emit sample");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(topic = %topic, output = sink.describe(), skipped, "output fell behind");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!(topic = %topic, output = sink.describe(), "output detached");
        })
    }
}

impl From<&OutputConfig> for Output {
    fn from(config: &OutputConfig) -> Self {
        match config {
            OutputConfig::File { path } => Output::file(path.clone()),
            OutputConfig::Tcp { addr } => Output::tcp(addr.clone()),
            OutputConfig::Log => Output::Log,
        }
    }
}

struct Sink {
    output: Output,
    stream: Option<TcpStream>,
}

impl Sink {
    fn describe(&self) -> &'static str {
        match self.output {
            Output::File(_) => "file",
            Output::Tcp(_) => "tcp",
            Output::Channel(_) => "channel",
            Output::Log => "log",
        }
    }

    fn is_closed(&self) -> bool {
        matches!(&self.output, Output::Channel(tx) if tx.is_closed())
    }

    async fn emit(&mut self, sample: &FlowSample) -> io::Result<()> {
        match &self.output {
            Output::File(path) => {
                let json = serde_json::to_string_pretty(sample)?;
                tokio::fs::write(path, json).await?;
            }
            Output::Tcp(addr) => {
                let mut line = serde_json::to_vec(sample)?;
                line.push(b'\n');

                let mut stream = match self.stream.take() {
                    Some(stream) => stream,
                    None => TcpStream::connect(addr.as_str()).await?,
                };
                stream.write_all(&line).await?;
                self.stream = Some(stream);
            }
            Output::Channel(tx) => {
                let _ = tx.try_send(*sample);
            }
            Output::Log => {
                tracing::info!(
                    timestamp_us = sample.timestamp.as_micros(),
                    flow_rate = sample.flow_rate,
                    healthy = sample.healthy,
                    "flow sample"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SamplePublisher;
    use fluidflow_types::Timestamp;
    use std::time::Duration;
    use tokio::io::AsyncBufReadExt;
    use tokio::net::TcpListener;

    fn sample(micros: u64, flow_rate: f32) -> FlowSample {
        FlowSample::new(Timestamp::from_micros(micros), flow_rate)
    }

    #[tokio::test]
    async fn channel_output_forwards_samples() {
        let bus = Bus::new();
        let (output, mut rx) = Output::channel(8);
        let _forwarder = output.attach(&bus, "fluid_flow");

        bus.publish("fluid_flow", sample(100, 1.5));
        bus.publish("other", sample(200, 9.0));
        bus.publish("fluid_flow", sample(300, 1.7));

        assert_eq!(rx.recv().await.unwrap(), sample(100, 1.5));
        assert_eq!(rx.recv().await.unwrap(), sample(300, 1.7));
    }

    #[tokio::test]
    async fn attach_until_drops_subscription_when_signalled() {
        let bus = Bus::new();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
        let forwarder = Output::Log.attach_until(&bus, "fluid_flow", async move {
            let _ = done_rx.await;
        });
        assert_eq!(bus.subscriber_count("fluid_flow"), 1);

        drop(done_tx);
        tokio::time::timeout(Duration::from_secs(1), forwarder)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bus.subscriber_count("fluid_flow"), 0);
    }

    #[tokio::test]
    async fn channel_output_stops_when_receiver_dropped() {
        let bus = Bus::new();
        let (output, rx) = Output::channel(8);
        let forwarder = output.attach(&bus, "fluid_flow");
        drop(rx);

        bus.publish("fluid_flow", sample(100, 1.5));
        tokio::time::timeout(Duration::from_secs(1), forwarder)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn file_output_holds_latest_sample() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flow.json");

        let bus = Bus::new();
        let (tap, mut tap_rx) = Output::channel(8);
        let _file = Output::file(&path).attach(&bus, "fluid_flow");
        let _tap = tap.attach(&bus, "fluid_flow");

        bus.publish("fluid_flow", sample(100, 1.25));
        bus.publish("fluid_flow", sample(200, 1.75));
        tap_rx.recv().await.unwrap();
        tap_rx.recv().await.unwrap();

        let mut written = None;
        for _ in 0..50 {
            if let Ok(text) = tokio::fs::read_to_string(&path).await {
                if let Ok(sample) = serde_json::from_str::<FlowSample>(&text) {
                    if sample.timestamp.as_micros() == 200 {
                        written = Some(sample);
                        break;
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(written, Some(sample(200, 1.75)));
    }

    #[tokio::test]
    async fn tcp_output_sends_ndjson_over_one_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let bus = Bus::new();
        let _forwarder = Output::tcp(addr).attach(&bus, "fluid_flow");

        bus.publish("fluid_flow", sample(100, 1.5));
        let (socket, _) = listener.accept().await.unwrap();
        bus.publish("fluid_flow", sample(200, 1.6));

        let mut lines = tokio::io::BufReader::new(socket).lines();
        let first: FlowSample = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        let second: FlowSample = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(first, sample(100, 1.5));
        assert_eq!(second, sample(200, 1.6));
    }

    #[test]
    fn built_from_config() {
        let output = Output::from(&OutputConfig::Tcp {
            addr: "localhost:9000".into(),
        });
        assert!(matches!(output, Output::Tcp(addr) if addr == "localhost:9000"));
        assert!(matches!(Output::from(&OutputConfig::Log), Output::Log));
    }
}

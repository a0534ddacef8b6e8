//! Interactive command console driving the simulator.
//!
//! ```
//! use std::sync::Arc;
//! use fluidflow_cli::{Command, Console};
//! use fluidflow_sdk::{Bus, ParameterStore, SimulatorConfig, TaskRegistry};
//!
//! # tokio_test::block_on(async {
//! let registry = Arc::new(TaskRegistry::new(Bus::new(), ParameterStore::default()));
//! let mut console = Console::new(registry, SimulatorConfig::default(), Vec::new());
//!
//! let command = Command::parse("param set FFS_MAX_FLOW 4").unwrap().unwrap();
//! console.execute(command).await.unwrap();
//! assert_eq!(console.output(), b"FFS_MAX_FLOW = 4.0000\n");
//! # });
//! ```

use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Result};
use fluidflow_sdk::{ParamId, SimulatorConfig, SimulatorError, TaskRegistry};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast::error::RecvError;

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Status,
    ParamShow,
    ParamSet { name: String, value: String },
    /// Print the next `n` published samples.
    Listen(usize),
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Command>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("start", []) => Command::Start,
            ("stop", []) => Command::Stop,
            ("status", []) => Command::Status,
            ("param", ["show"]) => Command::ParamShow,
            ("param", ["set", name, value]) => Command::ParamSet {
                name: name.to_string(),
                value: value.to_string(),
            },
            ("param", _) => bail!("usage: param show | param set <NAME> <VALUE>"),
            ("listen", []) => Command::Listen(1),
            ("listen", [count]) => match count.parse() {
                Ok(n) if n > 0 => Command::Listen(n),
                _ => bail!("usage: listen [count], count must be a positive integer"),
            },
            ("help", _) => Command::Help,
            ("quit" | "exit", []) => Command::Quit,
            ("start" | "stop" | "status" | "listen" | "quit" | "exit", _) => {
                bail!("{verb}: unexpected arguments")
            }
            _ => bail!("unknown command: {verb}"),
        };
        Ok(Some(command))
    }
}

/// Whether the console keeps reading after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Usage text for the console.
pub fn usage(config: &SimulatorConfig) -> String {
    format!(
        "\
Simulated fluid flow sensor.

Publishes a pseudo-random flow rate in l/min on '{topic}' every {period} ms.
The value is redrawn from [FFS_MIN_FLOW, FFS_MAX_FLOW) once more than
FFS_CHANGE_INTERVAL microseconds have passed since the last change.

Usage: {name} <command> [arguments...]
 Commands:
   start                      start the simulator
   stop                       stop the simulator
   status                     print status info
   param show                 print parameter values
   param set <NAME> <VALUE>   change a parameter
   listen [count]             print the next published samples
   help                       print this text
   quit                       stop everything and exit
",
        topic = config.topic,
        period = config.period().as_millis(),
        name = config.module_name,
    )
}

/// Reads commands and applies them to a [`TaskRegistry`].
pub struct Console<W> {
    registry: Arc<TaskRegistry>,
    config: SimulatorConfig,
    out: W,
}

impl<W: Write> Console<W> {
    pub fn new(registry: Arc<TaskRegistry>, config: SimulatorConfig, out: W) -> Self {
        Self {
            registry,
            config,
            out,
        }
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Read commands until `quit`, end of input, or `shutdown` resolves,
    /// then stop every task.
    pub async fn run<R, F>(&mut self, input: R, shutdown: F) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        F: Future<Output = ()>,
    {
        let mut lines = input.lines();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    match Command::parse(&line) {
                        Ok(Some(command)) => {
                            if self.execute(command).await? == Flow::Quit {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            writeln!(self.out, "{e}")?;
                            if e.to_string().starts_with("unknown command") {
                                write!(self.out, "{}", usage(&self.config))?;
                            }
                        }
                    }
                    self.out.flush()?;
                }
                _ = &mut shutdown => {
                    writeln!(self.out, "interrupted")?;
                    break;
                }
            }
        }

        self.registry.shutdown().await;
        Ok(())
    }

    /// Run a single command.
    pub async fn execute(&mut self, command: Command) -> Result<Flow> {
        let name = self.config.module_name.clone();
        match command {
            Command::Start => match self.registry.start(&self.config) {
                Ok(id) => writeln!(self.out, "{name} started as {id}")?,
                Err(SimulatorError::AlreadyRunning(_)) => {
                    writeln!(self.out, "{name} is already running")?
                }
                Err(e) => writeln!(self.out, "{name} failed to start: {e}")?,
            },
            Command::Stop => match self.registry.stop_by_name(&name) {
                Ok(id) => writeln!(self.out, "stop requested for {name} {id}")?,
                Err(_) => writeln!(self.out, "{name} is not running")?,
            },
            Command::Status => {
                let status = self
                    .registry
                    .find(&name)
                    .and_then(|id| self.registry.status(id));
                match status {
                    Some(status) => writeln!(self.out, "{status}")?,
                    None => writeln!(self.out, "{name} is not running")?,
                }
            }
            Command::ParamShow => {
                let params = self.registry.store().current();
                for id in ParamId::ALL {
                    writeln!(self.out, "{id} = {}", params.get(id))?;
                }
            }
            Command::ParamSet { name, value } => {
                match self.registry.store().set_from_str(&name, &value) {
                    Ok(id) => {
                        // Keep the next `start` from reseeding stale values.
                        self.config.params = self.registry.store().current();
                        let value = self.registry.store().get(id);
                        writeln!(self.out, "{id} = {value}")?;
                    }
                    Err(e) => writeln!(self.out, "{name}: {e}")?,
                }
            }
            Command::Listen(count) => self.listen(count).await?,
            Command::Help => write!(self.out, "{}", usage(&self.config))?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    async fn listen(&mut self, count: usize) -> Result<()> {
        let mut rx = self.registry.bus().subscribe(&self.config.topic);
        let wait = self.config.period() * 10;

        let mut received = 0;
        while received < count {
            match tokio::time::timeout(wait, rx.recv()).await {
                Ok(Ok(sample)) => {
                    received += 1;
                    writeln!(
                        self.out,
                        "{:>12} us  {:.2} l/min  {}",
                        sample.timestamp.as_micros(),
                        sample.flow_rate,
                        if sample.healthy { "healthy" } else { "unhealthy" }
                    )?;
                }
                Ok(Err(RecvError::Lagged(skipped))) => {
                    writeln!(self.out, "({skipped} samples skipped)")?;
                }
                Ok(Err(RecvError::Closed)) | Err(_) => {
                    writeln!(
                        self.out,
                        "no samples on '{}' within {} ms",
                        self.config.topic,
                        wait.as_millis()
                    )?;
                    break;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluidflow_sdk::{Bus, ParameterStore};
    use std::time::Duration;

    fn console() -> Console<Vec<u8>> {
        let config = SimulatorConfig {
            seed: Some(3),
            ..Default::default()
        };
        let registry = Arc::new(TaskRegistry::new(Bus::new(), ParameterStore::default()));
        Console::new(registry, config, Vec::new())
    }

    fn text(console: &Console<Vec<u8>>) -> String {
        String::from_utf8(console.output().clone()).unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("start").unwrap(), Some(Command::Start));
        assert_eq!(Command::parse("  STATUS ").unwrap(), Some(Command::Status));
        assert_eq!(Command::parse("").unwrap(), None);
        assert_eq!(Command::parse("param show").unwrap(), Some(Command::ParamShow));
        assert_eq!(
            Command::parse("param set FFS_MIN_FLOW 0.5").unwrap(),
            Some(Command::ParamSet {
                name: "FFS_MIN_FLOW".into(),
                value: "0.5".into()
            })
        );
        assert_eq!(Command::parse("listen").unwrap(), Some(Command::Listen(1)));
        assert_eq!(Command::parse("listen 5").unwrap(), Some(Command::Listen(5)));
        assert_eq!(Command::parse("exit").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn test_parse_errors() {
        let err = Command::parse("calibrate").unwrap_err();
        assert_eq!(err.to_string(), "unknown command: calibrate");
        assert!(Command::parse("param").is_err());
        assert!(Command::parse("param set FFS_MIN_FLOW").is_err());
        assert!(Command::parse("listen 0").is_err());
        assert!(Command::parse("stop now").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_status_stop() {
        let mut console = console();

        console.execute(Command::Status).await.unwrap();
        console.execute(Command::Start).await.unwrap();
        console.execute(Command::Start).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        console.execute(Command::Status).await.unwrap();
        console.execute(Command::Stop).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        console.execute(Command::Stop).await.unwrap();

        let out = text(&console);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "fluidflow_simulator is not running");
        assert_eq!(lines[1], "fluidflow_simulator started as #1");
        assert_eq!(lines[2], "fluidflow_simulator is already running");
        assert_eq!(lines[3], "fluidflow_simulator #1: running on 'fluid_flow'");
        assert!(out.contains("flow rate: 1.50 l/min"));
        assert!(out.contains("stop requested for fluidflow_simulator #1"));
        assert_eq!(lines.last(), Some(&"fluidflow_simulator is not running"));
    }

    #[tokio::test]
    async fn test_param_show_and_set() {
        let mut console = console();

        console
            .execute(Command::ParamSet {
                name: "ffs_max_flow".into(),
                value: "3".into(),
            })
            .await
            .unwrap();
        console
            .execute(Command::ParamSet {
                name: "FFS_CHANGE_INTERVAL".into(),
                value: "1.5".into(),
            })
            .await
            .unwrap();
        console.execute(Command::ParamShow).await.unwrap();

        let out = text(&console);
        assert!(out.contains("FFS_MAX_FLOW = 3.0000\n"));
        assert!(out.contains("FFS_CHANGE_INTERVAL: "));
        assert!(out.contains("FFS_MIN_FLOW = 1.0000\n"));
        assert!(out.contains("FFS_CHANGE_INTERVAL = 10000000\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_param_set_survives_start() {
        let mut console = console();
        let updates = [
            ("FFS_MAX_FLOW", "6"),
            ("FFS_MIN_FLOW", "5"),
            ("FFS_CHANGE_INTERVAL", "0"),
        ];
        for (name, value) in updates {
            console
                .execute(Command::ParamSet {
                    name: name.into(),
                    value: value.into(),
                })
                .await
                .unwrap();
        }
        console.execute(Command::Start).await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;

        let params = console.registry.store().current();
        assert_eq!((params.min_flow, params.max_flow), (5.0, 6.0));
        let id = console.registry.find("fluidflow_simulator").unwrap();
        let last = console.registry.status(id).unwrap().last_sample.unwrap();
        assert!((5.0..6.0).contains(&last.flow_rate));
    }

    #[tokio::test(start_paused = true)]
    async fn test_listen_prints_samples() {
        let mut console = console();
        console.execute(Command::Start).await.unwrap();
        console.execute(Command::Listen(3)).await.unwrap();

        let out = text(&console);
        let samples: Vec<&str> = out.lines().filter(|l| l.contains("l/min")).collect();
        assert_eq!(samples.len(), 3);
        assert!(samples[0].ends_with("100000 us  1.50 l/min  healthy"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_listen_times_out_without_simulator() {
        let mut console = console();
        console.execute(Command::Listen(1)).await.unwrap();
        assert_eq!(text(&console), "no samples on 'fluid_flow' within 1000 ms\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_script_until_quit() {
        let mut console = console();
        let script = b"help\nstart\nbogus\n\nquit\nstatus\n";

        console
            .run(&script[..], std::future::pending::<()>())
            .await
            .unwrap();

        let out = text(&console);
        assert!(out.starts_with("Simulated fluid flow sensor."));
        assert!(out.contains("fluidflow_simulator started as #1"));
        assert!(out.contains("unknown command: bogus\nSimulated fluid flow sensor."));
        assert!(!out.contains("not running"));
        assert!(!console.registry.is_running("fluidflow_simulator"));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_signal() {
        let mut console = console();
        let (_tx, rx) = tokio::io::duplex(64);
        let input = tokio::io::BufReader::new(rx);

        console.run(input, async {}).await.unwrap();
        assert_eq!(text(&console), "interrupted\n");
    }
}

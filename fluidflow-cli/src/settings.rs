//! Layered configuration: TOML file, then `FLUIDFLOW_*` environment
//! variables, then command-line overrides.
//!
//! Nested keys use a double underscore in the environment, so
//! `FLUIDFLOW_PARAMS__MIN_FLOW=0.5` sets `params.min_flow`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File, Map};
use fluidflow_sdk::{OutputConfig, SimulatorConfig};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "FLUIDFLOW";

/// Values given on the command line; they win over every other layer.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub topic: Option<String>,
    pub period: Option<Duration>,
    pub seed: Option<u64>,
    pub output_file: Option<PathBuf>,
    pub output_tcp: Option<String>,
}

impl Overrides {
    fn apply(&self, config: &mut SimulatorConfig) {
        if let Some(topic) = &self.topic {
            config.topic = topic.clone();
        }
        if let Some(period) = self.period {
            config.period_micros = period.as_micros() as u64;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(path) = &self.output_file {
            config.outputs.push(OutputConfig::File { path: path.clone() });
        }
        if let Some(addr) = &self.output_tcp {
            config.outputs.push(OutputConfig::Tcp { addr: addr.clone() });
        }
    }
}

/// Load the configuration from the process environment.
pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<SimulatorConfig> {
    load_with_env(path, overrides, None)
}

/// Load with an explicit environment map instead of the process
/// environment when `env` is `Some`.
pub fn load_with_env(
    path: Option<&Path>,
    overrides: &Overrides,
    env: Option<Map<String, String>>,
) -> Result<SimulatorConfig> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path));
    }

    let config = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        )
        .build()
        .context("Failed to read configuration")?;

    let mut settings: SimulatorConfig = config
        .try_deserialize()
        .context("Invalid configuration")?;
    overrides.apply(&mut settings);
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn toml_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn env(vars: &[(&str, &str)]) -> Option<Map<String, String>> {
        Some(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_defaults_without_any_source() {
        let config = load_with_env(None, &Overrides::default(), env(&[])).unwrap();
        assert_eq!(config, SimulatorConfig::default());
    }

    #[test]
    fn test_file_values() {
        let file = toml_file(
            r#"
            topic = "pump/flow"
            seed = 11

            [params]
            min_flow = 0.5
            max_flow = 4.0
            change_interval_micros = 2000000

            [[outputs]]
            kind = "log"
            "#,
        );

        let config = load_with_env(Some(file.path()), &Overrides::default(), env(&[])).unwrap();
        assert_eq!(config.topic, "pump/flow");
        assert_eq!(config.seed, Some(11));
        assert_eq!(config.params.min_flow, 0.5);
        assert_eq!(config.params.max_flow, 4.0);
        assert_eq!(config.params.change_interval_micros, 2_000_000);
        assert_eq!(config.outputs, vec![OutputConfig::Log]);
        assert_eq!(config.module_name, "fluidflow_simulator");
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = toml_file("topic = \"from_file\"\n[params]\nmax_flow = 3.0\n");

        let config = load_with_env(
            Some(file.path()),
            &Overrides::default(),
            env(&[
                ("FLUIDFLOW_TOPIC", "from_env"),
                ("FLUIDFLOW_PARAMS__MIN_FLOW", "0.25"),
                ("FLUIDFLOW_PERIOD_MICROS", "50000"),
            ]),
        )
        .unwrap();
        assert_eq!(config.topic, "from_env");
        assert_eq!(config.params.min_flow, 0.25);
        assert_eq!(config.params.max_flow, 3.0);
        assert_eq!(config.period(), Duration::from_millis(50));
    }

    #[test]
    fn test_cli_overrides_everything() {
        let overrides = Overrides {
            topic: Some("from_cli".into()),
            period: Some(Duration::from_millis(250)),
            seed: Some(5),
            output_file: Some("flow.json".into()),
            output_tcp: Some("127.0.0.1:9000".into()),
        };

        let config =
            load_with_env(None, &overrides, env(&[("FLUIDFLOW_TOPIC", "from_env")])).unwrap();
        assert_eq!(config.topic, "from_cli");
        assert_eq!(config.period_micros, 250_000);
        assert_eq!(config.seed, Some(5));
        assert_eq!(
            config.outputs,
            vec![
                OutputConfig::File {
                    path: "flow.json".into()
                },
                OutputConfig::Tcp {
                    addr: "127.0.0.1:9000".into()
                },
            ]
        );
    }

    #[test]
    fn test_invalid_range_is_rejected() {
        let file = toml_file("[params]\nmin_flow = 5.0\nmax_flow = 1.0\n");
        let err = load_with_env(Some(file.path()), &Overrides::default(), env(&[])).unwrap_err();
        assert!(err.to_string().contains("invalid flow range"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = load_with_env(
            Some(Path::new("/nonexistent/fluidflow.toml")),
            &Overrides::default(),
            env(&[]),
        );
        assert!(result.is_err());
    }
}

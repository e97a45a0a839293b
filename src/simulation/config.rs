use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::simulation::error::SimulationError;

#[derive(Parser, Debug, Clone)]
pub struct CommandLineArgs {
    #[arg(long, short)]
    pub config: PathBuf,
    /// Overrides config values, e.g. --set simulation.end_time=7200
    #[arg(long = "set", value_parser = parse_key_val)]
    pub overrides: Vec<(String, String)>,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=value: no `=` found in `{s}`"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub network: PathBuf,
    pub population: PathBuf,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub simulation: Simulation,
    #[serde(default)]
    pub vehicle_types: Vec<VehicleTypeParams>,
    /// Path of the config file itself. Input paths are resolved relative to
    /// it.
    #[serde(skip)]
    pub context: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Output {
    pub output_dir: PathBuf,
    pub write_events: WriteEvents,
    pub logging: Logging,
}

impl Default for Output {
    fn default() -> Self {
        Output {
            output_dir: PathBuf::from("./output"),
            write_events: WriteEvents::Xml,
            logging: Logging::Info,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteEvents {
    None,
    Xml,
    XmlGz,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Logging {
    None,
    Info,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Simulation {
    pub start_time: u32,
    pub end_time: u32,
    pub sample_size: f32,
    /// Seconds a vehicle may wait at a buffer front before it is removed as
    /// stuck.
    pub stuck_threshold: u32,
    pub node_transition: NodeTransition,
    /// Optional intersection throughput cap in vehicles per hour, applied to
    /// every node on top of the link flow capacities.
    pub node_capacity_h: Option<f32>,
    pub seed: u64,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            start_time: 0,
            end_time: 86400,
            sample_size: 1.0,
            stuck_threshold: 10,
            node_transition: NodeTransition::RoundRobin,
            node_capacity_h: None,
            seed: 42,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeTransition {
    #[default]
    RoundRobin,
    CapacityWeighted,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VehicleTypeParams {
    pub mode: String,
    pub max_v: f32,
    #[serde(default = "default_pce")]
    pub pce: f32,
}

fn default_pce() -> f32 {
    1.0
}

impl Config {
    pub fn from_args(args: &CommandLineArgs) -> Result<Self, SimulationError> {
        let file = File::open(&args.config).map_err(|e| SimulationError::Io {
            path: args.config.clone(),
            source: e,
        })?;
        let reader = BufReader::new(file);
        let mut value: serde_yaml::Value =
            serde_yaml::from_reader(reader).map_err(|e| SimulationError::Parse {
                path: args.config.clone(),
                message: e.to_string(),
            })?;

        for (key, val) in &args.overrides {
            apply_override(&mut value, key, val);
        }

        let mut config: Config =
            serde_path_to_error::deserialize(value).map_err(|e| SimulationError::Parse {
                path: args.config.clone(),
                message: e.to_string(),
            })?;
        config.context = Some(args.config.clone());
        Ok(config)
    }

    /// A config with empty input paths, for assembling scenarios in memory.
    #[cfg(any(test, feature = "test_util"))]
    pub fn empty_for_test() -> Self {
        Config {
            network: PathBuf::new(),
            population: PathBuf::new(),
            output: Output::default(),
            simulation: Simulation::default(),
            vehicle_types: Vec::new(),
            context: None,
        }
    }
}

/// Sets a single value in the raw yaml document. Keys use dots to address
/// nested mappings, missing intermediate mappings are created.
fn apply_override(value: &mut serde_yaml::Value, key: &str, val: &str) {
    let mut current = value;
    let mut parts = key.split('.').peekable();
    while let Some(part) = parts.next() {
        let map = match current {
            serde_yaml::Value::Mapping(map) => map,
            other => {
                *other = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());
                match other {
                    serde_yaml::Value::Mapping(map) => map,
                    _ => unreachable!(),
                }
            }
        };
        let map_key = serde_yaml::Value::String(part.to_string());
        if parts.peek().is_some() {
            current = map
                .entry(map_key)
                .or_insert_with(|| serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
        } else {
            let parsed: serde_yaml::Value =
                serde_yaml::from_str(val).unwrap_or(serde_yaml::Value::String(val.to_string()));
            map.insert(map_key, parsed);
            return;
        }
    }
}

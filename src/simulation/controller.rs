use std::cell::{RefCell, RefMut};
use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use derive_builder::Builder;
use tracing::info;

use crate::simulation::config::{Config, WriteEvents};
use crate::simulation::error::{Result, SimulationError};
use crate::simulation::events::xml_writer::XmlEventsWriter;
use crate::simulation::events::{EventsManager, OnEventFnBuilder};
use crate::simulation::scenario::Scenario;
use crate::simulation::simulation::{Simulation, SimulationSummary};
use crate::simulation::{io, logging};

/// Holds objects which connect a running simulation to its computational
/// context, most importantly the events publisher. The value is of type Rc
/// because it is shared between the engines of one simulation.
#[derive(Clone, Debug, Builder)]
#[builder(pattern = "owned")]
pub struct ThreadLocalComputationalEnvironment {
    #[builder(default)]
    events_publisher: Rc<RefCell<EventsManager>>,
}

impl Default for ThreadLocalComputationalEnvironment {
    fn default() -> Self {
        ThreadLocalComputationalEnvironment {
            events_publisher: Rc::new(RefCell::new(EventsManager::new())),
        }
    }
}

impl ThreadLocalComputationalEnvironment {
    pub fn events_publisher_borrow_mut(&mut self) -> RefMut<'_, EventsManager> {
        self.events_publisher.borrow_mut()
    }

    pub fn events_publisher(&self) -> Rc<RefCell<EventsManager>> {
        self.events_publisher.clone()
    }
}

/// Loads the scenario named by the config, runs the simulation and writes the
/// events and summary files into the output directory.
pub fn run(config: Config) -> Result<SimulationSummary> {
    let output_path = io::resolve_path(&config.context, &config.output.output_dir);
    fs::create_dir_all(&output_path).map_err(|e| SimulationError::Io {
        path: output_path.clone(),
        source: e,
    })?;

    let _guards = logging::init_logging(&config);

    let scenario = Scenario::load(&config)?;
    info!(
        "Scenario loaded. Network has {} nodes and {} links, population has {} persons.",
        scenario.network.nodes.len(),
        scenario.network.links.len(),
        scenario.population.persons.len()
    );

    let events = create_events(&config, &output_path, Vec::new());
    let comp_env = ThreadLocalComputationalEnvironmentBuilder::default()
        .events_publisher(events)
        .build()
        .unwrap();

    let mut simulation = Simulation::new(&config, scenario, comp_env);
    let summary = simulation.run();

    write_summary(&summary, &output_path)?;
    info!(
        "Simulation finished. {} agents completed their schedule, {} agents got stuck.",
        summary.agents_completed, summary.agents_stuck
    );
    Ok(summary)
}

fn create_events(
    config: &Config,
    output_path: &std::path::Path,
    additional_subscribers: Vec<Box<OnEventFnBuilder>>,
) -> Rc<RefCell<EventsManager>> {
    let mut events = EventsManager::new();

    match config.output.write_events {
        WriteEvents::None => {}
        WriteEvents::Xml => {
            let events_path = output_path.join("events.xml");
            info!("adding events writer with path: {events_path:?}");
            XmlEventsWriter::register(events_path)(&mut events)
        }
        WriteEvents::XmlGz => {
            let events_path = output_path.join("events.xml.gz");
            info!("adding events writer with path: {events_path:?}");
            XmlEventsWriter::register(events_path)(&mut events)
        }
    }

    for subscriber in additional_subscribers {
        subscriber(&mut events);
    }

    Rc::new(RefCell::new(events))
}

fn write_summary(summary: &SimulationSummary, output_path: &std::path::Path) -> Result<()> {
    let summary_path: PathBuf = output_path.join("summary.json");
    let json =
        serde_json::to_string_pretty(summary).map_err(|e| SimulationError::Parse {
            path: summary_path.clone(),
            message: e.to_string(),
        })?;
    let mut file = File::create(&summary_path).map_err(|e| SimulationError::Io {
        path: summary_path.clone(),
        source: e,
    })?;
    file.write_all(json.as_bytes()).map_err(|e| SimulationError::Io {
        path: summary_path.clone(),
        source: e,
    })?;
    Ok(())
}

use itertools::Itertools;
use tracing::info;

use crate::simulation::config::Config;
use crate::simulation::error::{Result, SimulationError};
use crate::simulation::id::Id;
use crate::simulation::io;
use crate::simulation::network::Network;
use crate::simulation::population::Population;
use crate::simulation::vehicles::Garage;

/// All input of one simulation run, loaded and validated.
pub struct Scenario {
    pub network: Network,
    pub population: Population,
    pub garage: Garage,
}

impl Scenario {
    pub fn load(config: &Config) -> Result<Self> {
        let network_path = io::resolve_path(&config.context, &config.network);
        let network = Network::from_file(&network_path)?;

        let population_path = io::resolve_path(&config.context, &config.population);
        let population = Population::from_file(&population_path)?;

        let mut garage = Garage::new();
        for veh_type in &config.vehicle_types {
            garage.add_veh_type(Id::create(&veh_type.mode), veh_type.max_v, veh_type.pce);
        }
        info!("Garage has {} vehicle types.", config.vehicle_types.len());

        Self::validate(&network, &population, &garage)?;

        Ok(Scenario {
            network,
            population,
            garage,
        })
    }

    /// Route links must follow the network topology and every leg mode needs a
    /// vehicle type. Link and activity location ids were already checked
    /// during population loading.
    fn validate(network: &Network, population: &Population, garage: &Garage) -> Result<()> {
        for person in &population.persons {
            for leg in &person.plan.legs {
                if !garage.contains_veh_type(&leg.mode) {
                    return Err(SimulationError::InvalidPlan {
                        person: person.id.external().to_string(),
                        reason: format!("no vehicle type for mode {}", leg.mode.external()),
                    });
                }
                for (from, to) in leg.route.iter().tuple_windows() {
                    if !network.out_links_of(from).contains_key(to) {
                        return Err(SimulationError::DisconnectedRoute {
                            person: person.id.external().to_string(),
                            from: from.external().to_string(),
                            to: to.external().to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

use serde::Serialize;
use tracing::info;

use crate::simulation::agents::SimulationAgent;
use crate::simulation::config::Config;
use crate::simulation::controller::ThreadLocalComputationalEnvironment;
use crate::simulation::engines::activity_engine::{ActivityEngine, ActivityEngineBuilder};
use crate::simulation::engines::leg_engine::LegEngine;
use crate::simulation::network::sim_network::SimNetwork;
use crate::simulation::scenario::Scenario;

/// Counters reported after a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationSummary {
    pub agents_completed: u64,
    pub agents_stuck: u64,
}

pub struct Simulation {
    activity_engine: ActivityEngine,
    leg_engine: LegEngine,
    network: SimNetwork,
    comp_env: ThreadLocalComputationalEnvironment,
    start_time: u32,
    end_time: u32,
    agents_completed: u64,
    agents_stuck: u64,
}

impl Simulation {
    pub fn new(
        config: &Config,
        scenario: Scenario,
        comp_env: ThreadLocalComputationalEnvironment,
    ) -> Self {
        let start_time = config.simulation.start_time;
        let network = SimNetwork::from_network(&scenario.network, &config.simulation);

        // Agents whose plan is a single activity never leave it. They count
        // as completed right away and are not registered anywhere.
        let mut agents_completed = 0;
        let mut agents = Vec::with_capacity(scenario.population.persons.len());
        for person in scenario.population.persons {
            let mut agent = SimulationAgent::new_plan_based(person);
            if agent.is_at_last_plan_element() {
                agent.complete();
                agents_completed += 1;
            } else {
                agents.push(agent);
            }
        }

        let activity_engine =
            ActivityEngineBuilder::new(agents, start_time, comp_env.clone()).build();
        let leg_engine = LegEngine::new(scenario.garage, comp_env.clone());

        Simulation {
            activity_engine,
            leg_engine,
            network,
            comp_env,
            start_time,
            end_time: config.simulation.end_time,
            agents_completed,
            agents_stuck: 0,
        }
    }

    pub fn run(&mut self) -> SimulationSummary {
        let mut now = self.start_time;
        info!(
            "Starting simulation. Start time {}, end time {}.",
            self.start_time, self.end_time
        );

        while now <= self.end_time {
            if now % 600 == 0 {
                let _hour = now / 3600;
                let _min = (now % 3600) / 60;
                info!(
                    "Simulation at {_hour:02}:{_min:02}; {} vehicles on the network; {} links and {} nodes active",
                    self.network.veh_on_net(),
                    self.network.active_links(),
                    self.network.active_nodes()
                );
            }
            self.wakeup(now);
            self.terminate_legs(now);
            self.move_nodes(now);

            now += 1;
        }

        self.comp_env.events_publisher_borrow_mut().finish();

        SimulationSummary {
            agents_completed: self.agents_completed,
            agents_stuck: self.agents_stuck,
        }
    }

    /// Agents whose activity ends now start their next leg and enter the
    /// network on the first link of their route.
    fn wakeup(&mut self, now: u32) {
        let agents = self.activity_engine.do_step(now);
        for agent in agents {
            let vehicle = self.leg_engine.depart(agent, now);
            self.network.send_veh_en_route(vehicle, now);
        }
    }

    /// Vehicles which reach the end of their leg leave the network and their
    /// agents move on to the next activity.
    fn terminate_legs(&mut self, now: u32) {
        let arrived = self.network.move_links(now);
        for vehicle in arrived {
            let agent = self.leg_engine.arrive(vehicle, now);
            if let Some(_completed) = self.activity_engine.receive_agent(now, agent) {
                self.agents_completed += 1;
            }
        }
    }

    fn move_nodes(&mut self, now: u32) {
        let stuck = self.network.move_nodes(&mut self.comp_env, now);
        for vehicle in stuck {
            let _agent = self.leg_engine.remove_stuck(vehicle, now);
            self.agents_stuck += 1;
        }
    }
}

use ahash::AHashMap;

use crate::simulation::agents::{AgentEvent, EnvironmentalEventObserver, SimulationAgent};
use crate::simulation::id::Id;
use crate::simulation::network::Link;
use crate::simulation::population::Person;

/// A vehicle en route. Created by the garage when an agent departs and handed
/// back when the leg ends.
#[derive(Debug)]
pub struct SimVehicle {
    pub id: Id<SimVehicle>,
    pub max_v: f32,
    pub pce: f32,
    driver: Option<SimulationAgent>,
}

impl SimVehicle {
    pub fn new(id: Id<SimVehicle>, max_v: f32, pce: f32, driver: SimulationAgent) -> Self {
        SimVehicle {
            id,
            max_v,
            pce,
            driver: Some(driver),
        }
    }

    pub fn driver(&self) -> &SimulationAgent {
        self.driver.as_ref().unwrap_or_else(|| {
            panic!("Vehicle {} has no driver", self.id.external());
        })
    }

    pub fn driver_mut(&mut self) -> &mut SimulationAgent {
        self.driver.as_mut().unwrap_or_else(|| {
            panic!("Vehicle {} has no driver", self.id.external());
        })
    }

    fn take_driver(&mut self) -> Option<SimulationAgent> {
        self.driver.take()
    }

    pub fn curr_link_id(&self) -> Option<&Id<Link>> {
        self.driver().curr_link_id()
    }

    pub fn peek_next_link_id(&self) -> Option<&Id<Link>> {
        self.driver().peek_next_link_id()
    }

    pub fn is_wanting_to_arrive(&self) -> bool {
        self.driver().is_wanting_to_arrive_on_current_link()
    }

    /// Called when the vehicle has crossed a node onto its next route link.
    pub fn register_moved_to_next_link(&mut self, now: u32) {
        self.driver_mut().notify_event(AgentEvent::LeftLink, now);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleType {
    pub max_v: f32,
    pub pce: f32,
}

impl Default for VehicleType {
    fn default() -> Self {
        VehicleType {
            max_v: f32::MAX,
            pce: 1.0,
        }
    }
}

/// Creates vehicles at departures and takes them back at arrivals. Vehicle
/// attributes are looked up per mode, modes without an explicit type get the
/// default of one passenger car equivalent and unbounded speed, so the link
/// freespeed governs.
#[derive(Debug, Default)]
pub struct Garage {
    veh_types: AHashMap<Id<String>, VehicleType>,
}

impl Garage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_veh_type(&mut self, mode: Id<String>, max_v: f32, pce: f32) {
        self.veh_types.insert(mode, VehicleType { max_v, pce });
    }

    pub fn contains_veh_type(&self, mode: &Id<String>) -> bool {
        self.veh_types.contains_key(mode)
    }

    pub fn veh_id(person: &Id<Person>, mode: &Id<String>) -> Id<SimVehicle> {
        Id::create(&format!("{}_{}", person.external(), mode.external()))
    }

    pub fn unpark_veh(&self, agent: SimulationAgent, mode: &Id<String>) -> SimVehicle {
        let veh_type = self
            .veh_types
            .get(mode)
            .copied()
            .unwrap_or_default();
        let id = Self::veh_id(agent.id(), mode);
        SimVehicle::new(id, veh_type.max_v, veh_type.pce, agent)
    }

    pub fn park_veh(&self, mut vehicle: SimVehicle) -> SimulationAgent {
        vehicle.take_driver().unwrap_or_else(|| {
            panic!("Parked vehicle {} without a driver", vehicle.id.external());
        })
    }
}

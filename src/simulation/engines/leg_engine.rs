use crate::simulation::agents::{SimulationAgent, SimulationAgentState};
use crate::simulation::controller::ThreadLocalComputationalEnvironment;
use crate::simulation::events::{
    PersonArrivalEventBuilder, PersonDepartureEventBuilder, PersonEntersVehicleEventBuilder,
    PersonLeavesVehicleEventBuilder, PersonStuckEventBuilder,
};
use crate::simulation::vehicles::{Garage, SimVehicle};

/// Handles the transitions between activities and legs. Departing agents get
/// a vehicle from the garage, arriving and stuck agents hand it back.
pub struct LegEngine {
    garage: Garage,
    comp_env: ThreadLocalComputationalEnvironment,
}

impl LegEngine {
    pub fn new(garage: Garage, comp_env: ThreadLocalComputationalEnvironment) -> Self {
        LegEngine { garage, comp_env }
    }

    /// Puts an agent whose activity just ended onto its leg and returns the
    /// vehicle which has to be sent onto the network.
    pub fn depart(&mut self, mut agent: SimulationAgent, now: u32) -> SimVehicle {
        agent.advance_plan();
        assert_eq!(
            SimulationAgentState::LEG,
            agent.state(),
            "Expected agent {} to be on a leg after its activity ended",
            agent.id().external()
        );

        let leg = agent.curr_leg();
        let mode = leg.mode.clone();
        let start_link = leg
            .route
            .first()
            .expect("Validation guarantees non-empty routes")
            .clone();

        self.comp_env.events_publisher_borrow_mut().publish_event(
            &PersonDepartureEventBuilder::default()
                .time(now)
                .person(agent.id().clone())
                .link(start_link)
                .leg_mode(mode.clone())
                .build()
                .unwrap(),
        );

        let vehicle = self.garage.unpark_veh(agent, &mode);
        self.comp_env.events_publisher_borrow_mut().publish_event(
            &PersonEntersVehicleEventBuilder::default()
                .time(now)
                .person(vehicle.driver().id().clone())
                .vehicle(vehicle.id.clone())
                .build()
                .unwrap(),
        );
        vehicle
    }

    /// Ends the leg of a vehicle which reached its destination link and
    /// returns the agent, advanced onto its next activity.
    pub fn arrive(&mut self, vehicle: SimVehicle, now: u32) -> SimulationAgent {
        let link = vehicle
            .curr_link_id()
            .expect("Arriving vehicle must be on a link")
            .clone();
        let mode = vehicle.driver().curr_leg().mode.clone();

        self.comp_env.events_publisher_borrow_mut().publish_event(
            &PersonLeavesVehicleEventBuilder::default()
                .time(now)
                .person(vehicle.driver().id().clone())
                .vehicle(vehicle.id.clone())
                .build()
                .unwrap(),
        );
        self.comp_env.events_publisher_borrow_mut().publish_event(
            &PersonArrivalEventBuilder::default()
                .time(now)
                .person(vehicle.driver().id().clone())
                .link(link)
                .leg_mode(mode)
                .build()
                .unwrap(),
        );

        let mut agent = self.garage.park_veh(vehicle);
        agent.advance_plan();
        agent
    }

    /// Removes a stuck vehicle. Emits exactly one stuck event and completes
    /// the agent's schedule.
    pub fn remove_stuck(&mut self, vehicle: SimVehicle, now: u32) -> SimulationAgent {
        let link = vehicle
            .curr_link_id()
            .expect("Stuck vehicle must be on a link")
            .clone();
        let mode = vehicle.driver().curr_leg().mode.clone();

        self.comp_env.events_publisher_borrow_mut().publish_event(
            &PersonStuckEventBuilder::default()
                .time(now)
                .person(vehicle.driver().id().clone())
                .link(link)
                .leg_mode(mode)
                .build()
                .unwrap(),
        );

        let mut agent = self.garage.park_veh(vehicle);
        agent.complete();
        agent
    }
}

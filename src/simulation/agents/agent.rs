use std::fmt::{Debug, Formatter};

use crate::simulation::agents::plan_logic::PlanBasedSimulationLogic;
use crate::simulation::agents::{
    AgentEvent, EnvironmentalEventObserver, ScheduleStatus, SimAction, SimulationAgentLogic,
    SimulationAgentState,
};
use crate::simulation::id::Id;
use crate::simulation::network::Link;
use crate::simulation::population::{Activity, Leg, Person};

/// An agent in the simulation. The behavior is delegated to a logic object so
/// that agent kinds other than plan-followers can be plugged in.
pub struct SimulationAgent {
    logic: Box<dyn SimulationAgentLogic>,
}

impl SimulationAgent {
    pub fn new_plan_based(person: Person) -> Self {
        Self {
            logic: Box::new(PlanBasedSimulationLogic::new(person)),
        }
    }

    pub fn id(&self) -> &Id<Person> {
        self.logic.id()
    }

    pub fn curr_act(&self) -> &Activity {
        self.logic.curr_act()
    }

    pub fn curr_leg(&self) -> &Leg {
        self.logic.curr_leg()
    }

    pub fn advance_plan(&mut self) {
        self.logic.advance_plan();
    }

    pub fn complete(&mut self) {
        self.logic.complete();
    }

    pub fn state(&self) -> SimulationAgentState {
        self.logic.state()
    }

    pub fn status(&self) -> ScheduleStatus {
        self.logic.status()
    }

    pub fn compute_next_action(&self, now: u32) -> SimAction {
        self.logic.compute_next_action(now)
    }

    pub fn wakeup_time(&self, now: u32) -> u32 {
        self.logic.wakeup_time(now)
    }

    pub fn curr_link_id(&self) -> Option<&Id<Link>> {
        self.logic.curr_link_id()
    }

    pub fn peek_next_link_id(&self) -> Option<&Id<Link>> {
        self.logic.peek_next_link_id()
    }

    pub fn is_wanting_to_arrive_on_current_link(&self) -> bool {
        self.logic.is_wanting_to_arrive_on_current_link()
    }

    pub fn is_at_last_plan_element(&self) -> bool {
        self.logic.is_at_last_plan_element()
    }
}

impl EnvironmentalEventObserver for SimulationAgent {
    fn notify_event(&mut self, event: AgentEvent, now: u32) {
        self.logic.notify_event(event, now);
    }
}

impl Debug for SimulationAgent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationAgent")
            .field("id", self.logic.id())
            .field("state", &self.logic.state())
            .field("status", &self.logic.status())
            .finish()
    }
}

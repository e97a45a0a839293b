use crate::simulation::agents::{
    AgentEvent, EnvironmentalEventObserver, ScheduleStatus, SimAction, SimulationAgentLogic,
    SimulationAgentState,
};
use crate::simulation::id::Id;
use crate::simulation::network::Link;
use crate::simulation::population::{Activity, Leg, Person};

/// Executes a static plan element by element. The plan cursor walks the
/// interleaved act/leg sequence, even positions are activities, odd positions
/// are legs. A second cursor tracks the position within the current leg's
/// route.
pub struct PlanBasedSimulationLogic {
    id: Id<Person>,
    plan: crate::simulation::population::Plan,
    curr_plan_element: usize,
    curr_route_element: usize,
    status: ScheduleStatus,
}

impl PlanBasedSimulationLogic {
    pub fn new(person: Person) -> Self {
        Self {
            id: person.id,
            plan: person.plan,
            curr_plan_element: 0,
            curr_route_element: 0,
            status: ScheduleStatus::Planned,
        }
    }
}

impl EnvironmentalEventObserver for PlanBasedSimulationLogic {
    fn notify_event(&mut self, event: AgentEvent, _now: u32) {
        match event {
            AgentEvent::LeftLink => {
                self.curr_route_element += 1;
            }
            AgentEvent::ActivityFinished => {}
        }
    }
}

impl SimulationAgentLogic for PlanBasedSimulationLogic {
    fn id(&self) -> &Id<Person> {
        &self.id
    }

    fn curr_act(&self) -> &Activity {
        assert_eq!(
            self.state(),
            SimulationAgentState::ACTIVITY,
            "Current plan element of agent {} is not an activity",
            self.id.external()
        );
        &self.plan.acts[self.curr_plan_element / 2]
    }

    fn curr_leg(&self) -> &Leg {
        assert_eq!(
            self.state(),
            SimulationAgentState::LEG,
            "Current plan element of agent {} is not a leg",
            self.id.external()
        );
        &self.plan.legs[self.curr_plan_element / 2]
    }

    fn advance_plan(&mut self) {
        self.curr_plan_element += 1;
        assert!(
            self.curr_plan_element < self.plan.total_elements(),
            "Advanced plan of agent {} past its last element",
            self.id.external()
        );
        self.curr_route_element = 0;
        if self.status == ScheduleStatus::Planned {
            self.status = ScheduleStatus::Started;
        }
    }

    fn complete(&mut self) {
        self.status = ScheduleStatus::Completed;
    }

    fn state(&self) -> SimulationAgentState {
        if self.curr_plan_element % 2 == 0 {
            SimulationAgentState::ACTIVITY
        } else {
            SimulationAgentState::LEG
        }
    }

    fn status(&self) -> ScheduleStatus {
        self.status
    }

    fn compute_next_action(&self, now: u32) -> SimAction {
        assert_ne!(
            self.status,
            ScheduleStatus::Completed,
            "Asked for next action of completed agent {}",
            self.id.external()
        );
        match self.state() {
            SimulationAgentState::LEG => SimAction::Drive,
            SimulationAgentState::ACTIVITY => {
                let end_time = self.curr_act().cmp_end_time(now);
                if end_time > now {
                    SimAction::Stay { end_time }
                } else {
                    SimAction::Wait { until: end_time }
                }
            }
        }
    }

    fn wakeup_time(&self, now: u32) -> u32 {
        self.curr_act().cmp_end_time(now)
    }

    fn curr_link_id(&self) -> Option<&Id<Link>> {
        match self.state() {
            SimulationAgentState::ACTIVITY => Some(&self.curr_act().link_id),
            SimulationAgentState::LEG => self.curr_leg().route.get(self.curr_route_element),
        }
    }

    fn peek_next_link_id(&self) -> Option<&Id<Link>> {
        self.curr_leg().route.get(self.curr_route_element + 1)
    }

    fn is_wanting_to_arrive_on_current_link(&self) -> bool {
        self.curr_route_element == self.curr_leg().route.len() - 1
    }

    fn is_at_last_plan_element(&self) -> bool {
        self.curr_plan_element == self.plan.total_elements() - 1
    }
}

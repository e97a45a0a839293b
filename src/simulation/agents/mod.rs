use crate::simulation::id::Id;
use crate::simulation::network::Link;
use crate::simulation::population::{Activity, Leg, Person};

pub mod agent;
pub mod plan_logic;

pub use agent::SimulationAgent;

#[derive(PartialEq, Eq, Debug, Copy, Clone)]
#[allow(clippy::upper_case_acronyms)]
pub enum SimulationAgentState {
    LEG,
    ACTIVITY,
}

/// Lifecycle of an agent's schedule. The status only ever moves forward,
/// Completed is terminal.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone)]
pub enum ScheduleStatus {
    Unplanned,
    Planned,
    Started,
    Completed,
}

/// Runtime action derived from the current plan element.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum SimAction {
    /// The current activity has ended, the agent waits for its departure to
    /// be processed.
    Wait { until: u32 },
    /// The agent is on a leg and its vehicle moves through the network.
    Drive,
    /// The agent performs an activity until the given end time.
    Stay { end_time: u32 },
}

/// Things happening to an agent which its logic might react to.
#[derive(Debug)]
pub enum AgentEvent {
    ActivityFinished,
    LeftLink,
}

pub trait EnvironmentalEventObserver {
    fn notify_event(&mut self, event: AgentEvent, now: u32);
}

pub trait SimulationAgentLogic: EnvironmentalEventObserver {
    fn id(&self) -> &Id<Person>;
    fn curr_act(&self) -> &Activity;
    fn curr_leg(&self) -> &Leg;
    fn advance_plan(&mut self);
    /// Marks the schedule as completed. Called when the last plan element is
    /// reached or when the agent is removed as stuck.
    fn complete(&mut self);
    fn state(&self) -> SimulationAgentState;
    fn status(&self) -> ScheduleStatus;
    fn compute_next_action(&self, now: u32) -> SimAction;
    fn wakeup_time(&self, now: u32) -> u32;
    fn curr_link_id(&self) -> Option<&Id<Link>>;
    fn peek_next_link_id(&self) -> Option<&Id<Link>>;
    fn is_wanting_to_arrive_on_current_link(&self) -> bool;
    /// Whether the plan cursor points at the last element, meaning nothing
    /// follows the current activity or leg.
    fn is_at_last_plan_element(&self) -> bool;
}

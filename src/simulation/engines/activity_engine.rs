use crate::simulation::agents::{AgentEvent, EnvironmentalEventObserver, SimAction, SimulationAgent};
use crate::simulation::controller::ThreadLocalComputationalEnvironment;
use crate::simulation::events::{ActivityEndEventBuilder, ActivityStartEventBuilder};
use crate::simulation::time_queue::{EndTime, TimeQueue};

/// Keeps agents while they perform activities and wakes them up when their
/// activity ends.
pub struct ActivityEngine {
    asleep_q: TimeQueue<AsleepSimulationAgent>,
    comp_env: ThreadLocalComputationalEnvironment,
}

impl ActivityEngine {
    /// Wakes agents up and asks each one what it wants to do next. Agents
    /// whose activity has ended are returned, ready to start their next leg.
    /// Agents which turn out not to be ready go back to sleep without an
    /// activity end event.
    pub fn do_step(&mut self, now: u32) -> Vec<SimulationAgent> {
        let woken = self.wake_up(now);
        let mut departing = Vec::with_capacity(woken.len());

        for agent in woken {
            match agent.compute_next_action(now) {
                SimAction::Wait { until: _ } => departing.push(agent),
                SimAction::Stay { end_time: _ } => {
                    self.asleep_q.add(AsleepSimulationAgent::build(agent, now), now);
                }
                SimAction::Drive => panic!(
                    "Agent {} woke up while on a leg. Only agents performing activities sleep.",
                    agent.id().external()
                ),
            }
        }

        self.publish_end_events(now, departing)
    }

    /// Takes in an agent which arrived at its next activity. If that activity
    /// is the last element of the plan, the agent is done and handed back to
    /// the caller instead of being queued for another wake up.
    pub fn receive_agent(&mut self, now: u32, mut agent: SimulationAgent) -> Option<SimulationAgent> {
        let act = agent.curr_act();
        self.comp_env.events_publisher_borrow_mut().publish_event(
            &ActivityStartEventBuilder::default()
                .time(now)
                .person(agent.id().clone())
                .link(act.link_id.clone())
                .act_type(act.act_type.clone())
                .build()
                .unwrap(),
        );
        if agent.is_at_last_plan_element() {
            agent.complete();
            return Some(agent);
        }
        self.asleep_q.add(AsleepSimulationAgent::build(agent, now), now);
        None
    }

    fn wake_up(&mut self, now: u32) -> Vec<SimulationAgent> {
        self.asleep_q
            .pop(now)
            .into_iter()
            .map(|asleep| asleep.agent)
            .collect()
    }

    fn publish_end_events(
        &mut self,
        now: u32,
        woken: Vec<SimulationAgent>,
    ) -> Vec<SimulationAgent> {
        let mut res = Vec::with_capacity(woken.len());
        for mut agent in woken {
            self.comp_env.events_publisher_borrow_mut().publish_event(
                &ActivityEndEventBuilder::default()
                    .time(now)
                    .person(agent.id().clone())
                    .link(agent.curr_act().link_id.clone())
                    .act_type(agent.curr_act().act_type.clone())
                    .build()
                    .unwrap(),
            );
            agent.notify_event(AgentEvent::ActivityFinished, now);
            res.push(agent);
        }
        res
    }

    pub fn asleep_agents(&self) -> usize {
        self.asleep_q.len()
    }
}

pub struct ActivityEngineBuilder {
    agents: Vec<SimulationAgent>,
    start_time: u32,
    comp_env: ThreadLocalComputationalEnvironment,
}

impl ActivityEngineBuilder {
    pub fn new(
        agents: Vec<SimulationAgent>,
        start_time: u32,
        comp_env: ThreadLocalComputationalEnvironment,
    ) -> Self {
        ActivityEngineBuilder {
            agents,
            start_time,
            comp_env,
        }
    }

    /// Registers the initial agents without publishing activity start events.
    /// Their first activity is already running when the simulation begins.
    pub fn build(self) -> ActivityEngine {
        let now = self.start_time;

        let mut asleep_q = TimeQueue::new();
        for agent in self.agents {
            asleep_q.add(AsleepSimulationAgent::build(agent, now), now);
        }
        ActivityEngine {
            asleep_q,
            comp_env: self.comp_env,
        }
    }
}

struct AsleepSimulationAgent {
    agent: SimulationAgent,
    wakeup_time: u32,
}

impl AsleepSimulationAgent {
    fn build(agent: SimulationAgent, now: u32) -> Self {
        let wakeup_time = agent.wakeup_time(now);
        AsleepSimulationAgent { agent, wakeup_time }
    }
}

impl EndTime for AsleepSimulationAgent {
    fn end_time(&self, _now: u32) -> u32 {
        self.wakeup_time
    }
}

use crate::simulation::agents::SimulationAgent;
use crate::simulation::id::Id;
use crate::simulation::network::Link;
use crate::simulation::population::{Activity, Leg, Person, Plan};
use crate::simulation::vehicles::SimVehicle;

/// A vehicle whose driver is on a leg along the given route, positioned on
/// the route's first link.
pub fn create_vehicle(id: &str, max_v: f32, pce: f32, route: &[&str]) -> SimVehicle {
    let agent = create_agent_on_leg(id, route);
    SimVehicle::new(Id::create(id), max_v, pce, agent)
}

/// An agent with a plan of one leg along the given route, still at its first
/// activity.
pub fn create_agent_at_act(id: &str, route: &[&str]) -> SimulationAgent {
    let links: Vec<Id<Link>> = route.iter().map(|l| Id::create(l)).collect();
    let first = links.first().unwrap().clone();
    let last = links.last().unwrap().clone();
    let plan = Plan {
        acts: vec![
            Activity {
                act_type: Id::create("home"),
                link_id: first,
                end_time: Some(0),
            },
            Activity {
                act_type: Id::create("work"),
                link_id: last,
                end_time: None,
            },
        ],
        legs: vec![Leg {
            mode: Id::create("car"),
            route: links,
        }],
    };
    SimulationAgent::new_plan_based(Person {
        id: Id::create(id),
        plan,
    })
}

/// An agent with a plan of one leg along the given route, advanced onto the
/// leg.
pub fn create_agent_on_leg(id: &str, route: &[&str]) -> SimulationAgent {
    let mut agent = create_agent_at_act(id, route);
    agent.advance_plan();
    agent
}

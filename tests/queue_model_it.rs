use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use queue_sim::simulation::config::Config;
use queue_sim::simulation::controller::ThreadLocalComputationalEnvironment;
use queue_sim::simulation::events::{
    LinkEnterEvent, LinkLeaveEvent, PersonArrivalEvent, PersonDepartureEvent, PersonStuckEvent,
};
use queue_sim::simulation::id::Id;
use queue_sim::simulation::network::{Link, Network, Node};
use queue_sim::simulation::population::{Activity, Leg, Person, Plan, Population};
use queue_sim::simulation::scenario::Scenario;
use queue_sim::simulation::simulation::Simulation;
use queue_sim::simulation::vehicles::Garage;

fn create_network(links: &[(&str, &str, &str, f64, f32, f32)]) -> Network {
    let mut network = Network::new();
    for node in ["a", "b", "c", "d"] {
        network.add_node(Node::new(Id::create(node), 0., 0.));
    }
    for (id, from, to, length, capacity, freespeed) in links {
        network.add_link(Link {
            id: Id::create(id),
            from: Id::get_from_ext(from),
            to: Id::get_from_ext(to),
            length: *length,
            capacity: *capacity,
            freespeed: *freespeed,
            permlanes: 1.,
        });
    }
    network
}

fn create_person(id: &str, end_time: u32) -> Person {
    Person {
        id: Id::create(id),
        plan: Plan {
            acts: vec![
                Activity {
                    act_type: Id::create("home"),
                    link_id: Id::get_from_ext("ab"),
                    end_time: Some(end_time),
                },
                Activity {
                    act_type: Id::create("work"),
                    link_id: Id::get_from_ext("cd"),
                    end_time: None,
                },
            ],
            legs: vec![Leg {
                mode: Id::create("car"),
                route: vec![
                    Id::get_from_ext("ab"),
                    Id::get_from_ext("bc"),
                    Id::get_from_ext("cd"),
                ],
            }],
        },
    }
}

fn create_scenario(network: Network, persons: Vec<Person>) -> Scenario {
    let mut garage = Garage::new();
    garage.add_veh_type(Id::create("car"), 13.9, 1.0);
    Scenario {
        network,
        population: Population { persons },
        garage,
    }
}

/// The capacity of the upstream link spaces out how quickly vehicles can
/// cross into the next link. 1800 veh/h means one vehicle every two seconds.
#[test]
fn flow_capacity_spaces_out_vehicles() {
    queue_sim::simulation::id::reset_id_store();
    let network = create_network(&[
        ("ab", "a", "b", 100., 1800., 10.),
        ("bc", "b", "c", 100., 3600., 10.),
        ("cd", "c", "d", 100., 3600., 10.),
    ]);
    let persons = vec![
        create_person("p1", 28800),
        create_person("p2", 28800),
        create_person("p3", 28800),
    ];

    let mut config = Config::empty_for_test();
    config.simulation.start_time = 28000;
    config.simulation.end_time = 30000;

    let mut comp_env = ThreadLocalComputationalEnvironment::default();
    let enters_bc = Rc::new(RefCell::new(Vec::new()));
    let collected = enters_bc.clone();
    comp_env
        .events_publisher()
        .borrow_mut()
        .on::<LinkEnterEvent, _>(move |event| {
            if event.link.external() == "bc" {
                collected.borrow_mut().push(event.time);
            }
        });

    let mut simulation = Simulation::new(&config, create_scenario(network, persons), comp_env);
    let summary = simulation.run();

    assert_eq!(3, summary.agents_completed);
    assert_eq!(0, summary.agents_stuck);
    assert_eq!(vec![28810, 28812, 28814], *enters_bc.borrow());
}

/// Vehicles get onto a link through a departure or a node transition and off
/// it through a node transition or an arrival. After a run in which every
/// agent finishes, the per link tallies balance out to zero.
#[test]
fn links_conserve_vehicles() {
    queue_sim::simulation::id::reset_id_store();
    let network = create_network(&[
        ("ab", "a", "b", 100., 1800., 10.),
        ("bc", "b", "c", 100., 3600., 10.),
        ("cd", "c", "d", 100., 3600., 10.),
    ]);
    let persons = vec![
        create_person("p1", 28800),
        create_person("p2", 28800),
        create_person("p3", 28805),
    ];

    let mut config = Config::empty_for_test();
    config.simulation.start_time = 28000;
    config.simulation.end_time = 30000;

    let mut comp_env = ThreadLocalComputationalEnvironment::default();
    let tally: Rc<RefCell<HashMap<String, i64>>> = Rc::new(RefCell::new(HashMap::new()));

    let on = tally.clone();
    comp_env
        .events_publisher()
        .borrow_mut()
        .on::<PersonDepartureEvent, _>(move |event| {
            *on.borrow_mut().entry(event.link.external().to_string()).or_default() += 1;
        });
    let on = tally.clone();
    comp_env
        .events_publisher()
        .borrow_mut()
        .on::<LinkEnterEvent, _>(move |event| {
            *on.borrow_mut().entry(event.link.external().to_string()).or_default() += 1;
        });
    let off = tally.clone();
    comp_env
        .events_publisher()
        .borrow_mut()
        .on::<LinkLeaveEvent, _>(move |event| {
            *off.borrow_mut().entry(event.link.external().to_string()).or_default() -= 1;
        });
    let off = tally.clone();
    comp_env
        .events_publisher()
        .borrow_mut()
        .on::<PersonArrivalEvent, _>(move |event| {
            *off.borrow_mut().entry(event.link.external().to_string()).or_default() -= 1;
        });

    let mut simulation = Simulation::new(&config, create_scenario(network, persons), comp_env);
    let summary = simulation.run();
    assert_eq!(3, summary.agents_completed);

    let tally = tally.borrow();
    assert_eq!(3, tally.len());
    for (link, count) in tally.iter() {
        assert_eq!(0, *count, "link {link} did not conserve vehicles");
    }
}

/// A vehicle which waits longer than the stuck threshold in front of a full
/// link is removed with a single stuck event. The blocking vehicle itself
/// finishes its plan.
#[test]
fn blocked_vehicle_is_removed_as_stuck() {
    queue_sim::simulation::id::reset_id_store();
    // bc holds exactly one vehicle and takes 50 seconds to traverse.
    let network = create_network(&[
        ("ab", "a", "b", 100., 3600., 10.),
        ("bc", "b", "c", 5., 3600., 0.1),
        ("cd", "c", "d", 100., 3600., 10.),
    ]);
    let persons = vec![create_person("p1", 28800), create_person("p2", 28800)];

    let mut config = Config::empty_for_test();
    config.simulation.start_time = 28000;
    config.simulation.end_time = 30000;
    config.simulation.stuck_threshold = 10;

    let mut comp_env = ThreadLocalComputationalEnvironment::default();
    let stuck_events = Rc::new(RefCell::new(Vec::new()));
    let collected = stuck_events.clone();
    comp_env
        .events_publisher()
        .borrow_mut()
        .on::<PersonStuckEvent, _>(move |event| {
            collected
                .borrow_mut()
                .push((event.time, event.person.external().to_string()));
        });

    let mut simulation = Simulation::new(&config, create_scenario(network, persons), comp_env);
    let summary = simulation.run();

    assert_eq!(1, summary.agents_completed);
    assert_eq!(1, summary.agents_stuck);
    let stuck = stuck_events.borrow();
    assert_eq!(1, stuck.len());
    assert_eq!("p2", stuck[0].1);
}

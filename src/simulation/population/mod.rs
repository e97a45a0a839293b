use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::simulation::error::SimulationError;
use crate::simulation::id::Id;
use crate::simulation::network::Link;
use crate::simulation::io;

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: Id<Person>,
    pub plan: Plan,
}

/// A plan alternates between activities and legs and starts and ends with an
/// activity. The two vectors are kept separate; the agent logic addresses
/// them through a single element cursor where even indices are activities and
/// odd indices are legs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Plan {
    pub acts: Vec<Activity>,
    pub legs: Vec<Leg>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub act_type: Id<String>,
    pub link_id: Id<Link>,
    pub end_time: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    pub mode: Id<String>,
    pub route: Vec<Id<Link>>,
}

#[derive(Debug, Default)]
pub struct Population {
    pub persons: Vec<Person>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IOPopulation {
    persons: Vec<IOPerson>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IOPerson {
    id: String,
    plan: Vec<IOPlanElement>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum IOPlanElement {
    Activity {
        act_type: String,
        link: String,
        #[serde(default)]
        end_time: Option<u32>,
    },
    Leg {
        mode: String,
        route: Vec<String>,
    },
}

impl Activity {
    /// End time used for the wake up queue. Activities without an explicit
    /// end time end immediately, except when they are the last plan element,
    /// in which case the agent finishes on arrival and is never woken again.
    pub fn cmp_end_time(&self, now: u32) -> u32 {
        self.end_time.unwrap_or(now)
    }
}

impl Plan {
    /// Number of elements in the interleaved act/leg sequence.
    pub fn total_elements(&self) -> usize {
        self.acts.len() + self.legs.len()
    }
}

impl Population {
    pub fn from_file(path: &Path) -> Result<Self, SimulationError> {
        let io_pop: IOPopulation = io::from_yaml_file(path)?;
        let result = Self::from_io(io_pop)?;
        info!("Loaded population with {} persons.", result.persons.len());
        Ok(result)
    }

    fn from_io(io_pop: IOPopulation) -> Result<Self, SimulationError> {
        let mut persons = Vec::with_capacity(io_pop.persons.len());
        for io_person in io_pop.persons {
            persons.push(Self::person_from_io(io_person)?);
        }
        Ok(Population { persons })
    }

    fn person_from_io(io_person: IOPerson) -> Result<Person, SimulationError> {
        let id = Id::<Person>::create(&io_person.id);
        let mut plan = Plan::default();

        for (i, element) in io_person.plan.iter().enumerate() {
            match element {
                IOPlanElement::Activity {
                    act_type,
                    link,
                    end_time,
                } => {
                    if i % 2 != 0 {
                        return Err(invalid_plan(&id, "two consecutive activities"));
                    }
                    let link_id = Id::<Link>::try_get_from_ext(link).ok_or_else(|| {
                        SimulationError::UnknownActivityLink {
                            person: id.external().to_string(),
                            link: link.clone(),
                        }
                    })?;
                    plan.acts.push(Activity {
                        act_type: Id::create(act_type),
                        link_id,
                        end_time: *end_time,
                    });
                }
                IOPlanElement::Leg { mode, route } => {
                    if i % 2 != 1 {
                        return Err(invalid_plan(&id, "plan must start with an activity"));
                    }
                    if route.is_empty() {
                        return Err(invalid_plan(&id, "leg with empty route"));
                    }
                    let mut links = Vec::with_capacity(route.len());
                    for link in route {
                        let link_id = Id::<Link>::try_get_from_ext(link).ok_or_else(|| {
                            SimulationError::UnknownLink {
                                person: id.external().to_string(),
                                link: link.clone(),
                            }
                        })?;
                        links.push(link_id);
                    }
                    plan.legs.push(Leg {
                        mode: Id::create(mode),
                        route: links,
                    });
                }
            }
        }

        if plan.acts.is_empty() {
            return Err(invalid_plan(&id, "plan without activities"));
        }
        if plan.acts.len() != plan.legs.len() + 1 {
            return Err(invalid_plan(&id, "plan must end with an activity"));
        }

        Ok(Person { id, plan })
    }
}

fn invalid_plan(person: &Id<Person>, reason: &str) -> SimulationError {
    SimulationError::InvalidPlan {
        person: person.external().to_string(),
        reason: String::from(reason),
    }
}

#[cfg(test)]
mod tests {
    use crate::simulation::error::SimulationError;
    use crate::simulation::id::Id;
    use crate::simulation::network::Link;
    use crate::simulation::population::{IOPerson, IOPlanElement, Population};

    fn act(link: &str, end_time: Option<u32>) -> IOPlanElement {
        IOPlanElement::Activity {
            act_type: String::from("home"),
            link: String::from(link),
            end_time,
        }
    }

    fn leg(route: Vec<&str>) -> IOPlanElement {
        IOPlanElement::Leg {
            mode: String::from("car"),
            route: route.into_iter().map(String::from).collect(),
        }
    }

    fn create_links(ids: &[&str]) {
        for id in ids {
            Id::<Link>::create(id);
        }
    }

    #[test]
    fn person_from_io_valid() {
        create_links(&["l1", "l2"]);
        let io_person = IOPerson {
            id: String::from("p1"),
            plan: vec![
                act("l1", Some(3600)),
                leg(vec!["l1", "l2"]),
                act("l2", None),
            ],
        };

        let person = Population::person_from_io(io_person).unwrap();

        assert_eq!("p1", person.id.external());
        assert_eq!(2, person.plan.acts.len());
        assert_eq!(1, person.plan.legs.len());
        assert_eq!(3, person.plan.total_elements());
        assert_eq!(
            vec![Id::<Link>::get_from_ext("l1"), Id::get_from_ext("l2")],
            person.plan.legs[0].route
        );
    }

    #[test]
    fn person_from_io_unknown_route_link() {
        create_links(&["l1"]);
        let io_person = IOPerson {
            id: String::from("p1"),
            plan: vec![act("l1", Some(1)), leg(vec!["l1", "missing"]), act("l1", None)],
        };

        let result = Population::person_from_io(io_person);
        assert!(matches!(result, Err(SimulationError::UnknownLink { .. })));
    }

    #[test]
    fn person_from_io_starts_with_leg() {
        create_links(&["l1"]);
        let io_person = IOPerson {
            id: String::from("p1"),
            plan: vec![leg(vec!["l1"]), act("l1", None)],
        };

        let result = Population::person_from_io(io_person);
        assert!(matches!(result, Err(SimulationError::InvalidPlan { .. })));
    }

    #[test]
    fn person_from_io_ends_with_leg() {
        create_links(&["l1"]);
        let io_person = IOPerson {
            id: String::from("p1"),
            plan: vec![act("l1", Some(1)), leg(vec!["l1"])],
        };

        let result = Population::person_from_io(io_person);
        assert!(matches!(result, Err(SimulationError::InvalidPlan { .. })));
    }
}

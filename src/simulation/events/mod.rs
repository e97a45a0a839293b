use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

use derive_builder::Builder;

use crate::simulation::id::Id;
use crate::simulation::network::Link;
use crate::simulation::population::Person;
use crate::simulation::vehicles::SimVehicle;

pub mod xml_writer;

pub trait EventTrait: Debug + Any {
    //This can't be a const, because traits with const fields are not dyn compatible.
    fn type_(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn time(&self) -> u32;
}

type OnEventFn = dyn Fn(&dyn EventTrait) + 'static;

pub type OnEventFnBuilder = dyn FnOnce(&mut EventsManager) + Send;

/// The EventsManager holds call-backs for event processing. Typed callbacks
/// are registered per concrete event type, which allows compile time checking
/// of the event types, since Rust has no reflection. Catch-all callbacks see
/// every event as a trait object.
#[derive(Default)]
pub struct EventsManager {
    per_type: HashMap<TypeId, Vec<Rc<OnEventFn>>>,
    catch_all: Vec<Box<OnEventFn>>,
    finish: Vec<Box<dyn Fn() + 'static>>,
    last_time: u32,
}

impl Debug for EventsManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EventsManager {{ per_type: {:?}, catch_all: {:?}, finish: {:?} }}",
            self.per_type.len(),
            self.catch_all.len(),
            self.finish.len()
        )
    }
}

impl EventsManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish_event(&mut self, event: &dyn EventTrait) {
        assert!(
            event.time() >= self.last_time,
            "Event time went backwards: {} after {} for {:?}",
            event.time(),
            self.last_time,
            event
        );
        self.last_time = event.time();

        let tid = event.as_any().type_id();
        if let Some(list) = self.per_type.get(&tid).cloned() {
            for h in list {
                h(event);
            }
        }
        for h in &self.catch_all {
            h(event);
        }
    }

    pub fn finish(&mut self) {
        for f in self.finish.iter_mut() {
            f()
        }
    }

    /// Registers a callback for a specific event type.
    pub fn on<E, F>(&mut self, f: F)
    where
        E: EventTrait,
        F: Fn(&E) + 'static,
    {
        let type_id = TypeId::of::<E>();
        let entry = self.per_type.entry(type_id).or_default();
        entry.push(Rc::new(move |ev: &dyn EventTrait| {
            if let Some(e) = ev.as_any().downcast_ref::<E>() {
                f(e);
            }
        }));
    }

    /// Registers a callback for all event types.
    pub fn on_any<F>(&mut self, f: F)
    where
        F: Fn(&dyn EventTrait) + 'static,
    {
        self.catch_all.push(Box::new(f));
    }

    pub fn on_finish<F>(&mut self, f: F)
    where
        F: Fn() + 'static,
    {
        self.finish.push(Box::new(f));
    }
}

macro_rules! impl_event_trait {
    ($event:ty) => {
        impl EventTrait for $event {
            fn type_(&self) -> &'static str {
                Self::TYPE
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn time(&self) -> u32 {
                self.time
            }
        }
    };
}

#[derive(Builder, Debug)]
pub struct ActivityStartEvent {
    pub time: u32,
    pub person: Id<Person>,
    pub link: Id<Link>,
    pub act_type: Id<String>,
}

impl ActivityStartEvent {
    pub const TYPE: &'static str = "actstart";
}
impl_event_trait!(ActivityStartEvent);

#[derive(Builder, Debug)]
pub struct ActivityEndEvent {
    pub time: u32,
    pub person: Id<Person>,
    pub link: Id<Link>,
    pub act_type: Id<String>,
}

impl ActivityEndEvent {
    pub const TYPE: &'static str = "actend";
}
impl_event_trait!(ActivityEndEvent);

#[derive(Builder, Debug)]
pub struct LinkEnterEvent {
    pub time: u32,
    pub link: Id<Link>,
    pub vehicle: Id<SimVehicle>,
}

impl LinkEnterEvent {
    pub const TYPE: &'static str = "entered link";
}
impl_event_trait!(LinkEnterEvent);

#[derive(Builder, Debug)]
pub struct LinkLeaveEvent {
    pub time: u32,
    pub link: Id<Link>,
    pub vehicle: Id<SimVehicle>,
}

impl LinkLeaveEvent {
    pub const TYPE: &'static str = "left link";
}
impl_event_trait!(LinkLeaveEvent);

#[derive(Builder, Debug)]
pub struct PersonEntersVehicleEvent {
    pub time: u32,
    pub person: Id<Person>,
    pub vehicle: Id<SimVehicle>,
}

impl PersonEntersVehicleEvent {
    pub const TYPE: &'static str = "PersonEntersVehicle";
}
impl_event_trait!(PersonEntersVehicleEvent);

#[derive(Builder, Debug)]
pub struct PersonLeavesVehicleEvent {
    pub time: u32,
    pub person: Id<Person>,
    pub vehicle: Id<SimVehicle>,
}

impl PersonLeavesVehicleEvent {
    pub const TYPE: &'static str = "PersonLeavesVehicle";
}
impl_event_trait!(PersonLeavesVehicleEvent);

#[derive(Builder, Debug)]
pub struct PersonDepartureEvent {
    pub time: u32,
    pub person: Id<Person>,
    pub link: Id<Link>,
    pub leg_mode: Id<String>,
}

impl PersonDepartureEvent {
    pub const TYPE: &'static str = "departure";
}
impl_event_trait!(PersonDepartureEvent);

#[derive(Builder, Debug)]
pub struct PersonArrivalEvent {
    pub time: u32,
    pub person: Id<Person>,
    pub link: Id<Link>,
    pub leg_mode: Id<String>,
}

impl PersonArrivalEvent {
    pub const TYPE: &'static str = "arrival";
}
impl_event_trait!(PersonArrivalEvent);

/// Emitted when a vehicle waited longer than the stuck threshold at a buffer
/// front and its agent is removed from the simulation.
#[derive(Builder, Debug)]
pub struct PersonStuckEvent {
    pub time: u32,
    pub person: Id<Person>,
    pub link: Id<Link>,
    pub leg_mode: Id<String>,
}

impl PersonStuckEvent {
    pub const TYPE: &'static str = "stuck";
}
impl_event_trait!(PersonStuckEvent);

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::simulation::events::{
        ActivityEndEventBuilder, ActivityStartEventBuilder, EventsManager, LinkEnterEventBuilder,
    };
    use crate::simulation::id::Id;

    fn act_start(time: u32) -> super::ActivityStartEvent {
        ActivityStartEventBuilder::default()
            .time(time)
            .person(Id::create("p"))
            .link(Id::create("l"))
            .act_type(Id::create("home"))
            .build()
            .unwrap()
    }

    #[test]
    fn typed_handler_receives_matching_type() {
        let mut manager = EventsManager::new();
        let received = Rc::new(RefCell::new(Vec::new()));

        let clone = received.clone();
        manager.on::<super::ActivityStartEvent, _>(move |e| {
            clone.borrow_mut().push(e.time);
        });

        manager.publish_event(&act_start(1));
        let end = ActivityEndEventBuilder::default()
            .time(2)
            .person(Id::create("p"))
            .link(Id::create("l"))
            .act_type(Id::create("home"))
            .build()
            .unwrap();
        manager.publish_event(&end);

        assert_eq!(vec![1], *received.borrow());
    }

    #[test]
    fn catch_all_receives_everything() {
        let mut manager = EventsManager::new();
        let received = Rc::new(RefCell::new(Vec::new()));

        let clone = received.clone();
        manager.on_any(move |e| {
            clone.borrow_mut().push((e.time(), e.type_()));
        });

        manager.publish_event(&act_start(1));
        let enter = LinkEnterEventBuilder::default()
            .time(2)
            .link(Id::create("l"))
            .vehicle(Id::create("v"))
            .build()
            .unwrap();
        manager.publish_event(&enter);

        assert_eq!(
            vec![(1, "actstart"), (2, "entered link")],
            *received.borrow()
        );
    }

    #[test]
    fn finish_callbacks_invoked() {
        let mut manager = EventsManager::new();
        let called = Rc::new(RefCell::new(0));
        let clone = called.clone();
        manager.on_finish(move || {
            *clone.borrow_mut() += 1;
        });

        manager.finish();
        assert_eq!(1, *called.borrow());
    }

    #[test]
    #[should_panic]
    fn time_must_not_go_backwards() {
        let mut manager = EventsManager::new();
        manager.publish_event(&act_start(10));
        manager.publish_event(&act_start(9));
    }
}

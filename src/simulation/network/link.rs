use std::collections::VecDeque;
use std::fmt::Debug;

use crate::simulation::config;
use crate::simulation::id::Id;
use crate::simulation::network::flow_cap::Flowcap;
use crate::simulation::network::storage_cap::StorageCap;
use crate::simulation::network::stuck_timer::StuckTimer;
use crate::simulation::network::{Link, Node};
use crate::simulation::vehicles::SimVehicle;

/// Where a vehicle enters the link. Vehicles coming across the upstream node
/// enter at the start of the queue and must have been checked against the
/// storage capacity by the caller. Departing vehicles start their leg on the
/// link regardless of congestion, spillback constrains only network
/// transfers.
pub enum LinkPosition {
    QStart,
    Departure,
}

#[derive(Debug)]
pub struct SimLink {
    pub id: Id<Link>,
    q: VecDeque<VehicleQEntry>,
    buffer: VecDeque<SimVehicle>,
    length: f64,
    free_speed: f32,
    storage_cap: StorageCap,
    flow_cap: Flowcap,
    stuck_timer: StuckTimer,
    pub from: Id<Node>,
    pub to: Id<Node>,
}

#[derive(Debug)]
struct VehicleQEntry {
    vehicle: SimVehicle,
    earliest_exit_time: u32,
}

impl SimLink {
    pub fn from_link(link: &Link, effective_cell_size: f32, config: &config::Simulation) -> Self {
        SimLink::build(
            link.id.clone(),
            link.capacity,
            link.freespeed,
            link.permlanes,
            link.length,
            effective_cell_size,
            config,
            link.from.clone(),
            link.to.clone(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn build(
        id: Id<Link>,
        capacity_h: f32,
        free_speed: f32,
        perm_lanes: f32,
        length: f64,
        effective_cell_size: f32,
        config: &config::Simulation,
        from: Id<Node>,
        to: Id<Node>,
    ) -> Self {
        let storage_cap = StorageCap::build(
            length,
            perm_lanes,
            capacity_h,
            config.sample_size,
            effective_cell_size,
        );

        SimLink {
            id,
            q: VecDeque::new(),
            buffer: VecDeque::new(),
            length,
            free_speed,
            storage_cap,
            flow_cap: Flowcap::new(capacity_h, config.sample_size),
            stuck_timer: StuckTimer::new(config.stuck_threshold),
            from,
            to,
        }
    }

    pub fn flow_cap(&self) -> f32 {
        self.flow_cap.capacity_per_time_step()
    }

    pub fn push_veh(&mut self, vehicle: SimVehicle, now: u32, position: LinkPosition) {
        if let LinkPosition::QStart = position {
            assert!(
                self.is_available(),
                "Link {} has no storage capacity left for vehicle {}. The upstream node must check this before moving a vehicle.",
                self.id.external(),
                vehicle.id.external()
            );
        }
        self.push_veh_to_queue(vehicle, now);
    }

    fn push_veh_to_queue(&mut self, vehicle: SimVehicle, now: u32) {
        let speed = self.free_speed.min(vehicle.max_v);
        let duration = 1.max((self.length / speed as f64) as u32); // at least 1 second per link
        let earliest_exit_time = now + duration;

        self.storage_cap.consume(vehicle.pce);
        self.q.push_back(VehicleQEntry {
            vehicle,
            earliest_exit_time,
        });
    }

    /// Moves vehicles which have reached their earliest exit time from the
    /// queue into the buffer, as long as flow capacity allows it. Vehicles
    /// ending their leg on this link are removed right away, bypassing the
    /// flow capacity, and returned to the caller.
    pub fn do_sim_step(&mut self, now: u32) -> Vec<SimVehicle> {
        self.flow_cap.update_capacity(now);
        self.add_queue_to_buffer(now)
    }

    fn add_queue_to_buffer(&mut self, now: u32) -> Vec<SimVehicle> {
        let mut released_vehicles = vec![];

        while let Some(entry) = self.q.front() {
            if entry.earliest_exit_time > now {
                break;
            }

            if entry.vehicle.is_wanting_to_arrive() {
                let veh = self.q.pop_front().unwrap().vehicle;
                self.storage_cap.release(veh.pce);
                released_vehicles.push(veh);
                continue;
            }

            if self.has_flow_capacity_left() {
                let veh = self.q.pop_front().unwrap().vehicle;
                self.buffer.push_back(veh);
            } else {
                break;
            }
        }

        released_vehicles
    }

    fn has_flow_capacity_left(&self) -> bool {
        let buffer_cap = self.buffer.iter().map(|v| v.pce).sum::<f32>();
        self.flow_cap.value() - buffer_cap > 0.0
    }

    /// The next vehicle allowed to leave the link, if flow capacity is
    /// available. Starts the stuck timer for the vehicle at the buffer front.
    pub fn offers_veh(&self, now: u32) -> Option<&SimVehicle> {
        if let Some(veh) = self.buffer.front() {
            if self.flow_cap.has_capacity_left() {
                self.stuck_timer.start(now);
                return Some(veh);
            }
        }

        None
    }

    /// Removes the front vehicle from the buffer, consuming flow capacity and
    /// releasing the storage it occupied.
    pub fn pop_veh(&mut self) -> Option<SimVehicle> {
        if let Some(veh) = self.buffer.pop_front() {
            self.storage_cap.release(veh.pce);
            self.flow_cap.consume(veh.pce);
            self.stuck_timer.reset();
            return Some(veh);
        }
        None
    }

    pub fn is_veh_stuck(&self, now: u32) -> bool {
        self.stuck_timer.is_stuck(now)
    }

    pub fn is_available(&self) -> bool {
        self.storage_cap.is_available()
    }

    /// A link is active if either the queue or the buffer is not empty.
    pub(super) fn is_active(&self) -> bool {
        !self.q.is_empty() || !self.buffer.is_empty()
    }

    pub fn to_nodes_active(&self, now: u32) -> bool {
        // the node will only look at the vehicle at the top of the queue in the next
        // timestep, therefore peek whether vehicles are available then
        self.offers_veh(now + 1).is_some()
    }

    #[cfg(any(test, feature = "test_util"))]
    pub fn veh_count(&self) -> usize {
        self.q.len() + self.buffer.len()
    }

    #[cfg(any(test, feature = "test_util"))]
    pub fn used_storage(&self) -> f32 {
        self.storage_cap.used()
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use crate::simulation::config;
    use crate::simulation::id::Id;
    use crate::simulation::network::link::{LinkPosition, SimLink};
    use crate::simulation::test_utils::create_vehicle;

    fn create_link(capacity_h: f32, length: f64, config: &config::Simulation) -> SimLink {
        SimLink::build(
            Id::create("link"),
            capacity_h,
            10.,
            3.,
            length,
            7.5,
            config,
            Id::create("from"),
            Id::create("to"),
        )
    }

    #[test]
    fn calculates_exit_time() {
        let config = config::Simulation::default();
        let mut link = create_link(3600., 100., &config);

        // slow vehicle is bound by its own max speed: 100m / 5m/s = 20s
        let slow = create_vehicle("slow", 5., 1., &["link", "out"]);
        link.push_veh(slow, 0, LinkPosition::QStart);
        // fast vehicle is bound by the link freespeed: 100m / 10m/s = 10s
        let fast = create_vehicle("fast", 100., 1., &["link", "out"]);
        link.push_veh(fast, 0, LinkPosition::QStart);

        assert!(link.do_sim_step(9).is_empty());
        assert!(link.offers_veh(9).is_none());

        // the fast vehicle is ready at 10 but queued behind the slow one
        link.do_sim_step(10);
        assert!(link.offers_veh(10).is_none());

        link.do_sim_step(20);
        let offered = link.offers_veh(20).unwrap();
        assert_eq!("slow", offered.id.external());
    }

    #[test]
    fn fifo_ordering() {
        let config = config::Simulation::default();
        let mut link = create_link(36000., 10., &config);

        for i in 0..5 {
            let veh = create_vehicle(&format!("veh-{i}"), 10., 1., &["link", "out"]);
            link.push_veh(veh, 0, LinkPosition::QStart);
        }

        link.do_sim_step(1);
        for i in 0..5 {
            let veh = link.pop_veh().unwrap();
            assert_eq!(format!("veh-{i}"), veh.id.external());
        }
    }

    #[test]
    fn storage_consumed_and_released() {
        let config = config::Simulation::default();
        let mut link = create_link(3600., 100., &config);

        let veh = create_vehicle("veh", 10., 2.5, &["link", "out"]);
        link.push_veh(veh, 0, LinkPosition::QStart);
        assert_approx_eq!(2.5, link.used_storage());

        // moving into the buffer keeps the storage occupied
        link.do_sim_step(10);
        assert_approx_eq!(2.5, link.used_storage());

        // leaving the link releases it
        link.offers_veh(10).unwrap();
        link.pop_veh().unwrap();
        assert_approx_eq!(0.0, link.used_storage());
    }

    #[test]
    fn departure_ignores_available_storage() {
        let config = config::Simulation::default();
        // 10m with 1 lane holds 1.33 vehicles
        let mut link = SimLink::build(
            Id::create("link"),
            3600.,
            10.,
            1.,
            10.,
            7.5,
            &config,
            Id::create("from"),
            Id::create("to"),
        );

        link.push_veh(
            create_vehicle("first", 10., 2., &["link", "out"]),
            0,
            LinkPosition::QStart,
        );
        assert!(!link.is_available());

        // a departing vehicle still enters
        link.push_veh(
            create_vehicle("second", 10., 1., &["link", "out"]),
            0,
            LinkPosition::Departure,
        );
        assert_eq!(2, link.veh_count());
    }

    #[test]
    #[should_panic]
    fn push_at_q_start_asserts_storage() {
        let config = config::Simulation::default();
        let mut link = SimLink::build(
            Id::create("link"),
            3600.,
            10.,
            1.,
            10.,
            7.5,
            &config,
            Id::create("from"),
            Id::create("to"),
        );

        link.push_veh(
            create_vehicle("first", 10., 2., &["link", "out"]),
            0,
            LinkPosition::QStart,
        );
        link.push_veh(
            create_vehicle("second", 10., 1., &["link", "out"]),
            0,
            LinkPosition::QStart,
        );
    }

    #[test]
    fn flow_cap_limits_releases() {
        let config = config::Simulation::default();
        // 1800 veh/h is one vehicle every other second
        let mut link = create_link(1800., 10., &config);

        link.push_veh(
            create_vehicle("veh-1", 10., 1., &["link", "out"]),
            0,
            LinkPosition::QStart,
        );
        link.push_veh(
            create_vehicle("veh-2", 10., 1., &["link", "out"]),
            0,
            LinkPosition::QStart,
        );

        link.do_sim_step(1);
        assert!(link.offers_veh(1).is_some());
        link.pop_veh().unwrap();
        // budget is overdrawn now, the second vehicle has to wait
        link.do_sim_step(2);
        assert!(link.offers_veh(2).is_none());
        link.do_sim_step(3);
        assert!(link.offers_veh(3).is_some());
    }

    #[test]
    fn arrival_bypasses_flow_cap() {
        let config = config::Simulation::default();
        // tiny capacity, both vehicles still get released on arrival
        let mut link = create_link(360., 10., &config);

        link.push_veh(create_vehicle("veh-1", 10., 1., &["link"]), 0, LinkPosition::Departure);
        link.push_veh(create_vehicle("veh-2", 10., 1., &["link"]), 0, LinkPosition::Departure);

        let arrived = link.do_sim_step(1);
        assert_eq!(2, arrived.len());
        assert_approx_eq!(0.0, link.used_storage());
    }

    #[test]
    fn stuck_timer_runs_while_blocked() {
        let mut config = config::Simulation::default();
        config.stuck_threshold = 10;
        let mut link = create_link(3600., 10., &config);

        link.push_veh(
            create_vehicle("veh", 10., 1., &["link", "out"]),
            0,
            LinkPosition::QStart,
        );
        link.do_sim_step(1);

        link.offers_veh(1).unwrap();
        assert!(!link.is_veh_stuck(10));
        assert!(link.is_veh_stuck(11));
    }

    #[test]
    fn stuck_timer_reset_on_pop() {
        let mut config = config::Simulation::default();
        config.stuck_threshold = 10;
        let mut link = create_link(36000., 10., &config);

        link.push_veh(
            create_vehicle("veh-1", 10., 1., &["link", "out"]),
            0,
            LinkPosition::QStart,
        );
        link.push_veh(
            create_vehicle("veh-2", 10., 1., &["link", "out"]),
            0,
            LinkPosition::QStart,
        );
        link.do_sim_step(1);

        link.offers_veh(1).unwrap();
        link.pop_veh().unwrap();

        // the timer restarts for the next vehicle
        link.offers_veh(5).unwrap();
        assert!(!link.is_veh_stuck(14));
        assert!(link.is_veh_stuck(15));
    }
}

/// Per time step release budget of a link or node. A capacity of 900 veh/h
/// amounts to 0.25 budget per second, so one vehicle may leave every four
/// seconds. An indivisible vehicle may overdraw the budget; the deficit is
/// paid off by later accumulation before the next vehicle may leave.
#[derive(Debug, Clone)]
pub struct Flowcap {
    last_update_time: u32,
    value: f32,
    capacity_per_time_step: f32,
}

impl Flowcap {
    pub fn new(capacity_h: f32, sample_size: f32) -> Flowcap {
        let capacity_s = capacity_h * sample_size / 3600.;
        Flowcap {
            last_update_time: 0,
            value: capacity_s,
            capacity_per_time_step: capacity_s,
        }
    }

    /// Accumulates budget for the time steps since the last update. Unused
    /// budget does not pile up beyond one step's worth.
    pub fn update_capacity(&mut self, now: u32) {
        if now <= self.last_update_time {
            return;
        }
        let elapsed = (now - self.last_update_time) as f32;
        self.value =
            (self.value + elapsed * self.capacity_per_time_step).min(self.capacity_per_time_step);
        self.last_update_time = now;
    }

    pub fn has_capacity_left(&self) -> bool {
        self.value > 1e-10
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn consume(&mut self, by: f32) {
        self.value -= by;
    }

    pub fn capacity_per_time_step(&self) -> f32 {
        self.capacity_per_time_step
    }
}

/// StorageCap tracks the storage capacity of a link. The maximum is derived from the
/// physical dimensions of the link (length times lanes, divided by the effective size
/// of one vehicle cell), scaled by the sample size, and clamped from below to one time
/// step of flow capacity and to one vehicle, so a link can always hold what it may
/// release in a second and a single vehicle never gets stuck on a short link.
#[derive(Debug, Clone)]
pub struct StorageCap {
    max: f32,
    used: f32,
}

impl StorageCap {
    pub fn build(
        length: f64,
        perm_lanes: f32,
        capacity_h: f32,
        sample_size: f32,
        effective_cell_size: f32,
    ) -> Self {
        let flow_cap_s = capacity_h * sample_size / 3600.;
        let cap = length * perm_lanes as f64 * sample_size as f64 / effective_cell_size as f64;
        // storage capacity needs to be at least enough to handle the cap_per_time_step
        // and to hold one vehicle on degenerate short links:
        let max_storage_cap = flow_cap_s.max(cap as f32).max(1.0);

        Self {
            max: max_storage_cap,
            used: 0.0,
        }
    }

    pub fn used(&self) -> f32 {
        self.used
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// Consumes storage capacity. Called when a vehicle enters the link.
    pub fn consume(&mut self, value: f32) {
        self.used += value;
    }

    /// Releases storage capacity. Called when a vehicle leaves the link.
    pub fn release(&mut self, value: f32) {
        self.used -= value;
    }

    /// Tests whether there is storage capacity available on the link.
    pub fn is_available(&self) -> bool {
        let available_cap = self.max - self.used;
        available_cap > 0.0
    }
}

//! The event scheduler. All clocks derive from the EE clock: the bus
//! runs at half rate and the IOP at an eighth, with remainder carry so
//! neither drifts.

pub const EE_CLOCK: u64 = 294_912_000;
pub const IOP_CLOCK: u64 = 36_864_000;

/// Upper bound on one run slice, in EE cycles.
const MAX_STEP: u32 = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    VblankStart,
    FrameEnd,
    CdvdSeekDone,
    CdvdReadBlock,
}

#[derive(Clone, Copy, Debug)]
struct Event {
    kind: EventKind,
    time_to_run: i64,
    id: u64,
}

pub struct Scheduler {
    pub ee_cycles: i64,
    pub bus_cycles: i64,
    pub iop_cycles: i64,
    bus_remainder: u32,
    iop_remainder: u32,
    run_cycles: u32,
    closest_event_time: i64,
    next_id: u64,
    events: Vec<Event>,
}

impl Scheduler {
    pub fn new() -> Scheduler {
        Scheduler {
            ee_cycles: 0,
            bus_cycles: 0,
            iop_cycles: 0,
            bus_remainder: 0,
            iop_remainder: 0,
            run_cycles: 0,
            closest_event_time: i64::MAX,
            next_id: 0,
            events: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        *self = Scheduler::new();
    }

    /// EE cycles to run before the next event can fire.
    pub fn calculate_run_cycles(&mut self) -> u32 {
        self.run_cycles = if self.ee_cycles + MAX_STEP as i64 <= self.closest_event_time {
            MAX_STEP
        } else {
            (self.closest_event_time - self.ee_cycles).max(0) as u32
        };
        // With no event pending, free-run at the slice cap.
        if self.events.is_empty() {
            self.run_cycles = MAX_STEP;
        }
        self.run_cycles
    }

    /// Advance all clocks by the current slice; returns (bus, iop)
    /// cycles consumed.
    pub fn update_cycle_counts(&mut self) -> (u32, u32) {
        let run = self.run_cycles;
        self.ee_cycles += run as i64;

        let mut bus_run = run >> 1;
        self.bus_remainder += run & 0x1;
        if self.bus_remainder > 1 {
            bus_run += 1;
            self.bus_remainder = 0;
        }
        self.bus_cycles += bus_run as i64;

        let mut iop_run = run >> 3;
        self.iop_remainder += run & 0x7;
        if self.iop_remainder >= 8 {
            iop_run += 1;
            self.iop_remainder -= 8;
        }
        self.iop_cycles += iop_run as i64;

        (bus_run, iop_run)
    }

    pub fn add_event(&mut self, kind: EventKind, delta: u64) -> u64 {
        let event = Event { kind, time_to_run: self.ee_cycles + delta as i64, id: self.next_id };
        self.next_id += 1;
        self.closest_event_time = self.closest_event_time.min(event.time_to_run);
        self.events.push(event);
        event.id
    }

    pub fn delete_event(&mut self, id: u64) {
        self.events.retain(|e| e.id != id);
        self.recompute_closest();
    }

    fn recompute_closest(&mut self) {
        self.closest_event_time =
            self.events.iter().map(|e| e.time_to_run).min().unwrap_or(i64::MAX);
    }

    /// Remove and return every event whose time has come.
    pub fn pop_due(&mut self) -> Vec<EventKind> {
        if self.ee_cycles < self.closest_event_time {
            return Vec::new();
        }
        let now = self.ee_cycles;
        let mut due = Vec::new();
        self.events.retain(|e| {
            if e.time_to_run <= now {
                due.push(e.kind);
                false
            } else {
                true
            }
        });
        self.recompute_closest();
        due
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

use chrono::{DateTime, Utc};

// Half-open interval [start, end) of free time. A slot set is kept sorted,
// disjoint, with touching neighbours merged and no zero-length entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSlot {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

// Removes [range_start, range_end) from every slot and returns the
// normalized remainder. Idempotent, conserves covered duration minus the
// overlap with the subtracted range.
pub fn subtract_range(
    slots: Vec<TimeSlot>,
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
) -> Vec<TimeSlot> {
    if range_end <= range_start {
        return normalize(slots);
    }

    let mut remaining = Vec::with_capacity(slots.len() + 1);
    for slot in slots {
        if slot.end <= range_start || slot.start >= range_end {
            remaining.push(slot);
            continue;
        }
        if slot.start < range_start {
            remaining.push(TimeSlot::new(slot.start, range_start));
        }
        if slot.end > range_end {
            remaining.push(TimeSlot::new(range_end, slot.end));
        }
    }
    normalize(remaining)
}

pub fn normalize(mut slots: Vec<TimeSlot>) -> Vec<TimeSlot> {
    slots.retain(|slot| slot.end > slot.start);
    if slots.is_empty() {
        return slots;
    }

    slots.sort_unstable_by(|left, right| left.start.cmp(&right.start));
    let mut iter = slots.into_iter();
    let mut merged = vec![iter.next().expect("slots is non-empty")];
    for slot in iter {
        let last = merged
            .last_mut()
            .expect("merged always contains at least one slot");
        if slot.start <= last.end {
            if slot.end > last.end {
                last.end = slot.end;
            }
            continue;
        }
        merged.push(slot);
    }
    merged
}

pub fn total_minutes(slots: &[TimeSlot]) -> i64 {
    slots.iter().map(TimeSlot::minutes).sum()
}

pub fn overlap_minutes(
    slots: &[TimeSlot],
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
) -> i64 {
    if range_end <= range_start {
        return 0;
    }
    slots
        .iter()
        .map(|slot| {
            let start = slot.start.max(range_start);
            let end = slot.end.min(range_end);
            if end > start {
                (end - start).num_minutes()
            } else {
                0
            }
        })
        .sum()
}

use crate::domain::models::{ActivityKind, FixedBlock, ScheduledActivity, Task};
use crate::domain::slots::{self, TimeSlot};
use crate::infrastructure::ids::IdGenerator;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacingPolicy {
    pub min_chunk_minutes: u32,
    pub chunk_ceiling_minutes: u32,
    pub break_minutes: u32,
    pub buffer_days: u32,
    pub revision_block_minutes: u32,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            min_chunk_minutes: 30,
            chunk_ceiling_minutes: 120,
            break_minutes: 5,
            buffer_days: 1,
            revision_block_minutes: 60,
        }
    }
}

// Pipeline order is fixed: fixed blocks claim their spans first, task chunks
// are packed into what is left, revision filler consumes the rest. The only
// side effect is the in-place update of each task's remaining minutes.
pub fn generate_daily_schedule(
    date: NaiveDate,
    now: DateTime<Utc>,
    tasks: &mut [Task],
    fixed_blocks: &[FixedBlock],
    policy: &PacingPolicy,
    ids: &dyn IdGenerator,
) -> Vec<ScheduledActivity> {
    let (free, mut activities) = place_fixed_blocks(date, now, fixed_blocks, ids);
    let (free, task_activities) = pace_tasks(free, tasks, date, now, policy, ids);
    activities.extend(task_activities);
    activities.extend(fill_revision(free, policy, ids));

    activities.sort_by(|left, right| {
        left.start_at
            .cmp(&right.start_at)
            .then(left.end_at.cmp(&right.end_at))
    });
    activities
}

// Projects matching fixed blocks onto the day and carves them out of the
// free-time set. A block that already started is not reported again but
// still blocks the remainder of its span, so subtraction is unconditional.
pub fn place_fixed_blocks(
    date: NaiveDate,
    now: DateTime<Utc>,
    fixed_blocks: &[FixedBlock],
    ids: &dyn IdGenerator,
) -> (Vec<TimeSlot>, Vec<ScheduledActivity>) {
    let day_start = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("valid midnight"));
    let day_end = day_start + Duration::days(1);
    let free_start = if now > day_start { now } else { day_start };

    let mut free = if free_start < day_end {
        vec![TimeSlot::new(free_start, day_end)]
    } else {
        Vec::new()
    };

    let mut activities = Vec::new();
    for block in fixed_blocks {
        if !block.day.matches(date.weekday()) {
            continue;
        }
        let (Some(start_time), Some(end_time)) = (block.start_time(), block.end_time()) else {
            continue;
        };
        let start_at = Utc.from_utc_datetime(&date.and_time(start_time));
        let end_at = Utc.from_utc_datetime(&date.and_time(end_time));
        if end_at <= start_at {
            continue;
        }

        if end_at > free_start {
            activities.push(ScheduledActivity {
                id: ids.next_id("act"),
                kind: ActivityKind::FixedBlock,
                label: block.label.clone(),
                start_at,
                end_at,
                task_id: None,
            });
        }
        free = slots::subtract_range(free, start_at, end_at);
    }

    (free, activities)
}

// Orders the backlog by priority then deadline and greedily packs each
// task's daily goal into the free slots, interleaving short breaks. Updates
// the authoritative task records in place.
pub fn pace_tasks(
    free: Vec<TimeSlot>,
    tasks: &mut [Task],
    date: NaiveDate,
    now: DateTime<Utc>,
    policy: &PacingPolicy,
    ids: &dyn IdGenerator,
) -> (Vec<TimeSlot>, Vec<ScheduledActivity>) {
    let mut order: Vec<usize> = tasks
        .iter()
        .enumerate()
        .filter(|(_, task)| task.is_pending())
        .map(|(index, _)| index)
        .collect();
    order.sort_by(|&left, &right| {
        tasks[left]
            .priority
            .rank()
            .cmp(&tasks[right].priority.rank())
            .then(tasks[left].deadline.cmp(&tasks[right].deadline))
    });

    let mut free = free;
    let mut activities = Vec::new();

    for index in order {
        let daily_goal = daily_goal_minutes(&tasks[index], now, policy);
        let mut scheduled_today: u32 = 0;

        free.sort_unstable_by(|left, right| left.start.cmp(&right.start));
        let mut slot_index = 0;
        while slot_index < free.len() {
            if tasks[index].remaining_minutes == 0 || scheduled_today >= daily_goal {
                break;
            }
            let slot = free[slot_index];
            let slot_minutes = slot.minutes();
            if slot_minutes <= 0 {
                slot_index += 1;
                continue;
            }

            let goal_left = daily_goal - scheduled_today;
            let chunk = tasks[index]
                .remaining_minutes
                .min(goal_left)
                .min(slot_minutes.min(i64::from(u32::MAX)) as u32);
            // A sub-minimum chunk skips this slot, not the whole task.
            if chunk < policy.min_chunk_minutes {
                slot_index += 1;
                continue;
            }

            let chunk_end = slot.start + Duration::minutes(i64::from(chunk));
            activities.push(ScheduledActivity {
                id: ids.next_id("act"),
                kind: ActivityKind::Task,
                label: tasks[index].name.clone(),
                start_at: slot.start,
                end_at: chunk_end,
                task_id: Some(tasks[index].id.clone()),
            });

            let fits_break =
                i64::from(chunk) + i64::from(policy.break_minutes) <= slot_minutes;
            let span_end = if fits_break {
                let break_end = chunk_end + Duration::minutes(i64::from(policy.break_minutes));
                activities.push(ScheduledActivity {
                    id: ids.next_id("act"),
                    kind: ActivityKind::Break,
                    label: "Break".to_string(),
                    start_at: chunk_end,
                    end_at: break_end,
                    task_id: None,
                });
                break_end
            } else {
                chunk_end
            };

            free = slots::subtract_range(free, slot.start, span_end);
            tasks[index].record_progress(chunk);
            tasks[index].last_scheduled_on = Some(date);
            scheduled_today += chunk;
            slot_index = 0;
        }
    }

    (free, activities)
}

// One buffer day is reserved before the deadline; the result is clamped to
// [min_chunk, chunk_ceiling]. A deadline today or already passed lifts the
// ceiling and targets the entire remaining duration.
fn daily_goal_minutes(task: &Task, now: DateTime<Utc>, policy: &PacingPolicy) -> u32 {
    let days_until = (task.deadline - now).num_seconds() as f64 / SECONDS_PER_DAY;
    if days_until <= 0.0 {
        return task.remaining_minutes;
    }
    let effective_days = (days_until - f64::from(policy.buffer_days)).max(1.0);
    let goal = (f64::from(task.remaining_minutes) / effective_days).ceil() as u32;
    goal.clamp(policy.min_chunk_minutes, policy.chunk_ceiling_minutes)
}

// Chops leftover free time into revision blocks of up to an hour, leaving
// sub-minimum tails unused.
pub fn fill_revision(
    free: Vec<TimeSlot>,
    policy: &PacingPolicy,
    ids: &dyn IdGenerator,
) -> Vec<ScheduledActivity> {
    let mut free = free;
    free.sort_unstable_by(|left, right| left.start.cmp(&right.start));

    let mut activities = Vec::new();
    for slot in free {
        let mut cursor = slot.start;
        while (slot.end - cursor).num_minutes() >= i64::from(policy.min_chunk_minutes) {
            let length = (slot.end - cursor)
                .num_minutes()
                .min(i64::from(policy.revision_block_minutes));
            let end = cursor + Duration::minutes(length);
            activities.push(ScheduledActivity {
                id: ids.next_id("act"),
                kind: ActivityKind::Revision,
                label: "Revision".to_string(),
                start_at: cursor,
                end_at: end,
                task_id: None,
            });
            cursor = end;
        }
    }
    activities
}

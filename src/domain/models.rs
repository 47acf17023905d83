use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DaySelector {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
    EveryDay,
}

impl DaySelector {
    pub fn matches(self, weekday: Weekday) -> bool {
        match self {
            Self::Monday => weekday == Weekday::Mon,
            Self::Tuesday => weekday == Weekday::Tue,
            Self::Wednesday => weekday == Weekday::Wed,
            Self::Thursday => weekday == Weekday::Thu,
            Self::Friday => weekday == Weekday::Fri,
            Self::Saturday => weekday == Weekday::Sat,
            Self::Sunday => weekday == Weekday::Sun,
            Self::EveryDay => true,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "monday" | "mon" => Some(Self::Monday),
            "tuesday" | "tue" => Some(Self::Tuesday),
            "wednesday" | "wed" => Some(Self::Wednesday),
            "thursday" | "thu" => Some(Self::Thursday),
            "friday" | "fri" => Some(Self::Friday),
            "saturday" | "sat" => Some(Self::Saturday),
            "sunday" | "sun" => Some(Self::Sunday),
            "every_day" | "everyday" | "daily" => Some(Self::EveryDay),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
            Self::Saturday => "saturday",
            Self::Sunday => "sunday",
            Self::EveryDay => "every_day",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixedBlock {
    pub id: String,
    pub day: DaySelector,
    pub label: String,
    pub start: String,
    pub end: String,
}

impl FixedBlock {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "fixed_block.id")?;
        validate_non_empty(&self.label, "fixed_block.label")?;
        validate_hhmm(&self.start, "fixed_block.start")?;
        validate_hhmm(&self.end, "fixed_block.end")?;
        let (Some(start), Some(end)) = (self.start_time(), self.end_time()) else {
            return Err("fixed_block times must be HH:MM".to_string());
        };
        if end <= start {
            return Err("fixed_block.end must be after fixed_block.start".to_string());
        }
        Ok(())
    }

    pub fn start_time(&self) -> Option<NaiveTime> {
        parse_hhmm(&self.start)
    }

    pub fn end_time(&self) -> Option<NaiveTime> {
        parse_hhmm(&self.end)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn rank(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub deadline: DateTime<Utc>,
    pub estimated_minutes: u32,
    pub category: Option<String>,
    pub completed: bool,
    pub remaining_minutes: u32,
    pub last_scheduled_on: Option<NaiveDate>,
}

impl Task {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "task.id")?;
        validate_non_empty(&self.name, "task.name")?;
        if self.estimated_minutes == 0 {
            return Err("task.estimated_minutes must be > 0".to_string());
        }
        if self.remaining_minutes > self.estimated_minutes {
            return Err("task.remaining_minutes must be <= task.estimated_minutes".to_string());
        }
        if self.completed && self.remaining_minutes != 0 {
            return Err("completed task must have remaining_minutes == 0".to_string());
        }
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        !self.completed && self.remaining_minutes > 0
    }

    // Shared by the pacer and the elapsed-time tracker so both converge on
    // the same completion rule.
    pub fn record_progress(&mut self, minutes: u32) {
        self.remaining_minutes = self.remaining_minutes.saturating_sub(minutes);
        if self.remaining_minutes == 0 {
            self.completed = true;
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    FixedBlock,
    Task,
    Break,
    Revision,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledActivity {
    pub id: String,
    pub kind: ActivityKind,
    pub label: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub task_id: Option<String>,
}

impl ScheduledActivity {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "activity.id")?;
        validate_non_empty(&self.label, "activity.label")?;
        if self.end_at <= self.start_at {
            return Err("activity.end_at must be after activity.start_at".to_string());
        }
        Ok(())
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_hhmm(value: &str, field_name: &str) -> Result<(), String> {
    let mut split = value.split(':');
    let Some(hour_str) = split.next() else {
        return Err(format!("{field_name} must be HH:MM"));
    };
    let Some(minute_str) = split.next() else {
        return Err(format!("{field_name} must be HH:MM"));
    };
    if split.next().is_some() {
        return Err(format!("{field_name} must be HH:MM"));
    }

    let hour = hour_str
        .parse::<u8>()
        .map_err(|_| format!("{field_name} must be HH:MM"))?;
    let minute = minute_str
        .parse::<u8>()
        .map_err(|_| format!("{field_name} must be HH:MM"))?;
    if hour > 23 || minute > 59 {
        return Err(format!("{field_name} must be HH:MM"));
    }
    Ok(())
}

fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_fixed_block() -> FixedBlock {
        FixedBlock {
            id: "blk-1".to_string(),
            day: DaySelector::Monday,
            label: "Morning lecture".to_string(),
            start: "09:00".to_string(),
            end: "10:00".to_string(),
        }
    }

    fn sample_task() -> Task {
        Task {
            id: "tsk-1".to_string(),
            name: "Write essay".to_string(),
            description: Some("history coursework".to_string()),
            priority: Priority::High,
            deadline: fixed_time("2026-02-19T08:00:00Z"),
            estimated_minutes: 90,
            category: Some("coursework".to_string()),
            completed: false,
            remaining_minutes: 90,
            last_scheduled_on: None,
        }
    }

    fn sample_activity() -> ScheduledActivity {
        ScheduledActivity {
            id: "act-1".to_string(),
            kind: ActivityKind::Task,
            label: "Write essay".to_string(),
            start_at: fixed_time("2026-02-16T09:00:00Z"),
            end_at: fixed_time("2026-02-16T09:45:00Z"),
            task_id: Some("tsk-1".to_string()),
        }
    }

    #[test]
    fn fixed_block_validate_accepts_valid_block() {
        assert!(sample_fixed_block().validate().is_ok());
    }

    #[test]
    fn fixed_block_validate_rejects_reversed_range() {
        let mut block = sample_fixed_block();
        block.start = "10:00".to_string();
        block.end = "09:00".to_string();
        assert!(block.validate().is_err());
    }

    #[test]
    fn fixed_block_validate_rejects_malformed_time() {
        let mut block = sample_fixed_block();
        block.end = "25:00".to_string();
        assert!(block.validate().is_err());
    }

    #[test]
    fn day_selector_matches_weekday_and_wildcard() {
        assert!(DaySelector::Monday.matches(Weekday::Mon));
        assert!(!DaySelector::Monday.matches(Weekday::Tue));
        assert!(DaySelector::EveryDay.matches(Weekday::Sat));
    }

    #[test]
    fn day_selector_parse_accepts_short_names() {
        assert_eq!(DaySelector::parse("Wed"), Some(DaySelector::Wednesday));
        assert_eq!(DaySelector::parse("every_day"), Some(DaySelector::EveryDay));
        assert_eq!(DaySelector::parse("someday"), None);
    }

    #[test]
    fn task_validate_rejects_remaining_above_estimate() {
        let mut task = sample_task();
        task.remaining_minutes = 120;
        assert!(task.validate().is_err());
    }

    #[test]
    fn task_validate_rejects_completed_with_remaining() {
        let mut task = sample_task();
        task.completed = true;
        assert!(task.validate().is_err());
    }

    #[test]
    fn record_progress_completes_at_zero() {
        let mut task = sample_task();
        task.record_progress(45);
        assert_eq!(task.remaining_minutes, 45);
        assert!(!task.completed);

        task.record_progress(45);
        assert_eq!(task.remaining_minutes, 0);
        assert!(task.completed);
    }

    #[test]
    fn activity_validate_rejects_empty_interval() {
        let mut activity = sample_activity();
        activity.end_at = activity.start_at;
        assert!(activity.validate().is_err());
    }

    #[test]
    fn domain_models_support_serde_roundtrip() {
        let block = sample_fixed_block();
        let task = sample_task();
        let activity = sample_activity();

        let block_roundtrip: FixedBlock =
            serde_json::from_str(&serde_json::to_string(&block).expect("serialize block"))
                .expect("deserialize block");
        let task_roundtrip: Task =
            serde_json::from_str(&serde_json::to_string(&task).expect("serialize task"))
                .expect("deserialize task");
        let activity_roundtrip: ScheduledActivity =
            serde_json::from_str(&serde_json::to_string(&activity).expect("serialize activity"))
                .expect("deserialize activity");

        assert_eq!(block_roundtrip, block);
        assert_eq!(task_roundtrip, task);
        assert_eq!(activity_roundtrip, activity);
    }

    proptest! {
        #[test]
        fn record_progress_preserves_task_invariants(
            estimate in 1u32..600u32,
            steps in proptest::collection::vec(0u32..200u32, 0..8)
        ) {
            let mut task = sample_task();
            task.estimated_minutes = estimate;
            task.remaining_minutes = estimate;

            for minutes in steps {
                task.record_progress(minutes);
                prop_assert!(task.remaining_minutes <= task.estimated_minutes);
                prop_assert_eq!(task.completed, task.remaining_minutes == 0);
                prop_assert!(task.validate().is_ok());
            }
        }
    }
}

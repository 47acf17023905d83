pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::bootstrap::{bootstrap_workspace, BootstrapResult};
pub use application::commands::{
    complete_task_impl, create_fixed_block_impl, create_task_impl, delete_fixed_block_impl,
    delete_task_impl, generate_schedule_impl, get_timer_state_impl, list_fixed_blocks_impl,
    list_tasks_impl, start_timer_impl, stop_timer_impl, update_task_impl, PlannerState,
    TimerStateResponse,
};
pub use application::scheduler::{
    fill_revision, generate_daily_schedule, pace_tasks, place_fixed_blocks, PacingPolicy,
};
pub use domain::models::{
    ActivityKind, DaySelector, FixedBlock, Priority, ScheduledActivity, Task,
};
pub use domain::slots::{normalize, overlap_minutes, subtract_range, total_minutes, TimeSlot};
pub use infrastructure::clock::{Clock, FixedClock, SystemClock};
pub use infrastructure::error::InfraError;
pub use infrastructure::ids::{CounterIdGenerator, IdGenerator};
pub use infrastructure::repository::{
    BacklogRepository, InMemoryBacklogRepository, LoadedBacklog, SqliteBacklogRepository,
};

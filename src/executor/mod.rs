//! Background Job Executor
//!
//! All remote I/O of a node (bootstrap registration, announce, status quorum,
//! retention sweep) runs here instead of on the HTTP request path.
//!
//! ## Model
//! 1. **Submission**: a `Job` is handed to `Scheduler::enqueue`, which waits until a
//!    worker takes it. Nothing is buffered and nothing survives a restart.
//! 2. **Scaling**: each worker checks pool size against queue depth before taking
//!    the next job and either requests another worker or retires itself.
//! 3. **Execution**: the worker passes the job to a `JobHandler`. A failing or
//!    panicking job is logged; the worker keeps going.
//!
//! ## Submodules
//! - **`types`**: `Job` variants and `WorkerId`.
//! - **`scheduler`**: the elastic worker pool.
//! - **`dispatch`**: `JobHandler` and the production `JobDispatcher`.

pub mod dispatch;
pub mod scheduler;
pub mod types;

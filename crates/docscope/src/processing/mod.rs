//! Background pipeline execution with pollable job progress

mod annotate;
mod job_queue;
mod job_store;
mod pipeline;
mod worker;

pub use annotate::{annotate_images, AnnotationSummary};
pub use job_queue::{JobQueue, QueueStats, Submission};
pub use job_store::{JobStats, JobStore};
pub use pipeline::PipelineController;
pub use worker::{spawn_sweeper, PipelineWorker};

// src/engine/mod.rs

//! Queue orchestration for dlqueue.
//!
//! This module ties together:
//! - the ordered job queue with its duplicate policy ([`queue`])
//! - the sequential processor that drives jobs through a download backend
//!   and applies the retry policy ([`processor`])
//! - background title lookups for new jobs ([`metadata`])

pub mod metadata;
pub mod processor;
pub mod queue;

pub use metadata::{TitleFetcher, TitlePrefetcher, ToolTitleFetcher};
pub use processor::QueueProcessor;
pub use queue::{DownloadQueue, Enqueued, QueueSummary};

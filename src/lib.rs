//! Poll a remote temperature service and keep a consistent display state.
#![warn(missing_docs)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod display;
pub mod logging;
pub mod scheduler;
pub mod services;
pub mod view;

pub use temperature_common as common;

use std::future::Future;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Size of all internal channels.
pub const PIPE_SIZE: usize = 10;

/// Spawn a task and automatically monitor its execution.
///
/// A task that panics takes the whole process down with it.
pub fn spawn<T>(future: T) -> JoinHandle<()>
where
    T: Future + Send + 'static,
    T::Output: Send + 'static,
{
    let task = tokio::spawn(future);

    tokio::spawn(async move {
        match task.await {
            Ok(_rc) => {
                debug!("The thread terminated normally");
            }
            Err(err) if err.is_cancelled() => {
                debug!("The thread was cancelled");
            }
            Err(err) => {
                error!("The thread aborted with error: {err}");
                std::process::exit(1);
            }
        }
    })
}

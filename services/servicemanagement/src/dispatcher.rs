//! Lifecycle command loop
//!
//! The manager's own task. It owns the receiving end of a bounded crossbeam
//! channel and runs startup passes on request, answering on a per-request
//! reply channel.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam_channel::Sender;
use servicecore::{spawn_task, ServiceError, ServiceResult, TaskHandle};

use crate::manager::{panic_message, ManagerCore};

const TAG: &str = "ServiceMngr";

/// Command sent to the manager task
pub(crate) enum LifecycleCommand {
    /// Run a startup pass and send its result back
    Start {
        reply: Sender<ServiceResult<()>>,
    },
}

/// Spawn the manager task. The loop ends when the last sender is dropped.
pub(crate) fn spawn_lifecycle_task(
    core: Arc<ManagerCore>,
) -> ServiceResult<(Sender<LifecycleCommand>, TaskHandle)> {
    let config = core.config();
    let (tx, rx) = crossbeam_channel::bounded::<LifecycleCommand>(config.command_capacity.max(1));
    let name = config.name.clone();
    let priority = config.priority;
    let stack_bytes = config.identity.stack_size();
    let task_name = name.clone();

    let handle = spawn_task(&name, priority, stack_bytes, move || {
        while let Ok(command) = rx.recv() {
            match command {
                LifecycleCommand::Start { reply } => {
                    // A panicking pass is answered and the loop keeps serving.
                    let result = panic::catch_unwind(AssertUnwindSafe(|| core.on_startup_trigger()))
                        .unwrap_or_else(|payload| {
                            log::error!(
                                target: TAG,
                                "Startup pass panicked: {}",
                                panic_message(payload.as_ref())
                            );
                            Err(ServiceError::TaskPanicked(task_name.clone()))
                        });
                    let _ = reply.send(result);
                }
            }
        }
        log::debug!(target: TAG, "Lifecycle command loop finished");
    })?;

    Ok((tx, handle))
}

/// Ask the manager task for a startup pass and block until it answers.
pub(crate) fn request_startup(commands: &Sender<LifecycleCommand>) -> ServiceResult<()> {
    let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
    commands
        .send(LifecycleCommand::Start { reply: reply_tx })
        .map_err(|_| ServiceError::ManagerUnavailable("command channel closed".to_string()))?;
    reply_rx
        .recv()
        .map_err(|_| ServiceError::ManagerUnavailable("reply channel closed".to_string()))?
}

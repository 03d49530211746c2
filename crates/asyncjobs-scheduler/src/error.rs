//! Dispatch errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatch queue is closed")]
    QueueClosed,
}

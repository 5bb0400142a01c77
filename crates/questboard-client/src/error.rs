/// Errors returned by the [`Client`](crate::Client) handle.
///
/// Connection trouble is not among them: dropped sockets, failed connects
/// and dead heartbeats are handled inside the driver by reconnecting.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The client was closed, or its driver task has stopped.
    #[error("client is closed")]
    Closed,
}

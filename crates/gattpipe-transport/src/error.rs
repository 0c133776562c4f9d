/// Errors that can occur on a notification channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The link refused a fragment write.
    #[error("fragment write rejected: {0}")]
    WriteRejected(String),

    /// The link refused to enable notifications.
    #[error("notification subscribe rejected: {0}")]
    SubscribeRejected(String),

    /// The link is no longer connected.
    #[error("link disconnected")]
    Disconnected,

    /// An operation required an active subscription and none exists.
    #[error("channel is not subscribed")]
    NotSubscribed,
}

pub type Result<T> = std::result::Result<T, TransportError>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PodstatsError {
    #[error("Watch error: {0}")]
    Watch(String),

    #[error("List error: {0}")]
    List(String),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Resource version expired: {0}")]
    ResourceExpired(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Kubernetes client error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("Kubernetes config inference error: {0}")]
    InferConfig(#[from] kube::config::InferConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),

    #[error("Async task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Channel closed")]
    ChannelClosed,
}

/// Result type alias for podstats operations
pub type Result<T> = std::result::Result<T, PodstatsError>;

impl PodstatsError {
    /// Creates a new watch error
    pub fn watch<S: Into<String>>(msg: S) -> Self {
        Self::Watch(msg.into())
    }

    /// Creates a new list error
    pub fn list<S: Into<String>>(msg: S) -> Self {
        Self::List(msg.into())
    }

    /// Creates a new conversion error
    pub fn conversion<S: Into<String>>(msg: S) -> Self {
        Self::Conversion(msg.into())
    }

    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Watch(_) | Self::ResourceExpired(_) => "watch",
            Self::List(_) => "list",
            Self::Conversion(_) => "conversion",
            Self::Config(_) | Self::Kubeconfig(_) | Self::InferConfig(_) => "config",
            Self::Io(_) => "io",
            Self::Kube(_) => "kube",
            Self::Serialization(_) => "serialization",
            Self::Join(_) => "async",
            Self::ChannelClosed => "channel",
        }
    }
}

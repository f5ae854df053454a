use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Task not found: {id}")]
    TaskNotFound { id: crate::core::task::TaskId },

    #[error("Dependency cycle involving task {id}")]
    DependencyCycle { id: crate::core::task::TaskId },

    #[error("Stop timed out after {0:?}")]
    StopTimeout(std::time::Duration),
}

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("failed to decode context field '{name}'")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode context field '{name}'")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

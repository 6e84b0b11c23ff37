use thiserror::Error;

#[derive(Error, Debug)]
pub enum YamlError {
    #[error("failed to parse YAML: {message}")]
    InvalidYamlSyntax { message: String },

    #[error("invalid key path: {message}")]
    InvalidKeyPath { message: String },

    #[error("no content in YAML document")]
    EmptyDocument,

    #[error("rewritten document no longer holds {path} = {expected:?}")]
    VerificationFailed { path: String, expected: String },

    #[error("edit error: {0}")]
    Edit(#[from] crate::edit::EditError),
}

impl From<yaml_rust2::ScanError> for YamlError {
    fn from(err: yaml_rust2::ScanError) -> Self {
        YamlError::InvalidYamlSyntax {
            message: err.to_string(),
        }
    }
}

use thiserror::Error;

/// Everything that can go wrong between file selection and a committed
/// record set. Validation failures are user-correctable; transport
/// failures are retryable; normalization failures mean the server
/// contract changed and retrying the upload will not help.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Please select files to upload")]
    NoFilesSelected,

    #[error("Unsupported file format(s): {}", .names.join(", "))]
    UnsupportedFiles { names: Vec<String> },

    #[error("An upload is already in progress")]
    UploadInProgress,

    #[error("{message}")]
    Transport { message: String },

    #[error("Invalid response format: {expectation}")]
    Normalization { expectation: String },
}

impl ExtractError {
    pub fn normalization(expectation: impl Into<String>) -> Self {
        ExtractError::Normalization {
            expectation: expectation.into(),
        }
    }

    /// True for failures the user can fix by correcting their selection.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ExtractError::NoFilesSelected | ExtractError::UnsupportedFiles { .. }
        )
    }
}

/// Fallback shown when the server gives us nothing better.
pub const GENERIC_UPLOAD_ERROR: &str = "An error occurred during file upload or extraction";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_files_names_every_offender() {
        let err = ExtractError::UnsupportedFiles {
            names: vec!["notes.txt".to_string(), "movie.mp4".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Unsupported file format(s): notes.txt, movie.mp4"
        );
    }
}

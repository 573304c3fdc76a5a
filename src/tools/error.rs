//! Tool error type

/// Failure of a tool run. The first three variants are the caller's fault.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Incorrect password for this PDF")]
    WrongPassword,

    #[error("File too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },

    #[error("Processing failed: {0}")]
    Processing(String),

    /// Subprocess or AI provider failure
    #[error("{0}")]
    External(String),

    #[error("{what} timed out after {secs}s")]
    Timeout { what: String, secs: u64 },
}

impl ToolError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn processing(msg: impl std::fmt::Display) -> Self {
        Self::Processing(msg.to_string())
    }

    pub fn external(msg: impl Into<String>) -> Self {
        Self::External(msg.into())
    }

    /// True when the request itself was at fault
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::UnsupportedFormat(_) | Self::WrongPassword | Self::TooLarge { .. }
        )
    }
}

impl From<lopdf::Error> for ToolError {
    fn from(err: lopdf::Error) -> Self {
        Self::Processing(format!("PDF error: {}", err))
    }
}

impl From<image::ImageError> for ToolError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Unsupported(e) => Self::UnsupportedFormat(e.to_string()),
            image::ImageError::Decoding(e) => Self::InvalidInput(format!("Could not decode image: {}", e)),
            other => Self::Processing(format!("Image error: {}", other)),
        }
    }
}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        Self::Processing(format!("I/O error: {}", err))
    }
}

impl From<zip::result::ZipError> for ToolError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Processing(format!("Zip error: {}", err))
    }
}

pub type ToolResult<T> = Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert!(ToolError::invalid("x").is_client_error());
        assert!(ToolError::WrongPassword.is_client_error());
        assert!(ToolError::TooLarge { size: 2, limit: 1 }.is_client_error());
        assert!(!ToolError::external("soffice crashed").is_client_error());
        assert!(!ToolError::Timeout { what: "tesseract".into(), secs: 5 }.is_client_error());
    }

    #[test]
    fn test_messages() {
        let err = ToolError::Timeout { what: "LibreOffice".into(), secs: 120 };
        assert_eq!(err.to_string(), "LibreOffice timed out after 120s");
        assert_eq!(ToolError::UnsupportedFormat("xyz".into()).to_string(), "Unsupported format: xyz");
    }
}

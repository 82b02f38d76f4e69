//! Error types for the transformation pipeline

use std::fmt;

/// Error that can occur while transforming or assembling stylesheets
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A loader needs an external backend that was not provided.
    ///
    /// Carries the loader name and the package the user has to install
    /// (or inject) to process files of that dialect.
    MissingBackend { loader: String, package: String },
    /// A loader failed while processing a file
    LoaderFailed { loader: String, message: String },
    /// Invalid plugin configuration (bad pattern, unreadable config file, ...)
    Config(String),
    /// A source map could not be decoded, encoded or merged
    SourceMap(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingBackend { loader, package } => write!(
                f,
                "You need to install \"{}\" in order to process files with the '{}' loader",
                package, loader
            ),
            Error::LoaderFailed { loader, message } => {
                write!(f, "Loader '{}' failed: {}", loader, message)
            }
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::SourceMap(msg) => write!(f, "Source map error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Convenience constructor used by loaders reporting their own failures
    pub fn loader(loader: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::LoaderFailed {
            loader: loader.into(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_backend_names_the_package() {
        let err = Error::MissingBackend {
            loader: "sass".to_string(),
            package: "grass".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("grass"));
        assert!(text.contains("sass"));
    }

    #[test]
    fn loader_constructor_stringifies_message() {
        let err = Error::loader("less", "unexpected token");
        assert_eq!(
            err,
            Error::LoaderFailed {
                loader: "less".to_string(),
                message: "unexpected token".to_string(),
            }
        );
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("connection error: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("statement `{description}` failed: {source}")]
    Statement {
        description: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn statement(description: impl Into<String>, source: sqlx::Error) -> Self {
        Error::Statement {
            description: description.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[allow(dead_code)]
pub trait WithContext<T> {
    fn context(self, msg: impl Into<String>) -> Result<T>;
}

impl<T> WithContext<T> for Result<T> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Context {
            context: msg.into(),
            source: Box::new(e),
        })
    }
}

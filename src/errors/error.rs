use std::fmt;
use std::io;

#[derive(Debug)]
pub enum Error {
    Generic(String),
    IO(io::Error),
    InvalidObject(String),
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Generic(msg) => write!(f, "Error: {}", msg),
            Error::IO(err) => write!(f, "IO error: {}", err),
            Error::InvalidObject(msg) => write!(f, "Invalid object: {}", msg),
            Error::Config(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::IO(error)
    }
}

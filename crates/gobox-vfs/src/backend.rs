use std::fmt;
use std::str::FromStr;

use crate::error::FsError;

/// Storage backend an instance lives on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BackendKind {
    #[default]
    Memory,
    /// Reserved for cross-session storage; opening it always fails.
    Durable,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::Durable => "durable",
        }
    }

    pub fn is_implemented(self) -> bool {
        matches!(self, BackendKind::Memory)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "memory" | "mem" => Ok(BackendKind::Memory),
            "durable" | "localStorage" => Ok(BackendKind::Durable),
            other => Err(FsError::UnsupportedBackend(other.to_string())),
        }
    }
}

#[cfg(feature = "clap")]
impl clap::ValueEnum for BackendKind {
    fn value_variants<'a>() -> &'a [Self] {
        const ALL: [BackendKind; 2] = [BackendKind::Memory, BackendKind::Durable];
        &ALL
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            BackendKind::Memory => Some(clap::builder::PossibleValue::new("memory")),
            BackendKind::Durable => {
                Some(clap::builder::PossibleValue::new("durable").alias("localStorage"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn parses_known_backends() {
        assert_eq!("memory".parse::<BackendKind>(), Ok(BackendKind::Memory));
        assert_eq!(
            "localStorage".parse::<BackendKind>(),
            Ok(BackendKind::Durable)
        );
        assert!(!BackendKind::Durable.is_implemented());
    }

    #[test]
    fn unknown_backend_is_unsupported() {
        let err = "indexeddb".parse::<BackendKind>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedBackend);
    }
}

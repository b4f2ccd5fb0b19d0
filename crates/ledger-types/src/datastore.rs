//! Data store back-ends a message server can mediate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::TypeError;

/// Storage back-end of the shared database.
///
/// Sent by the server during the handshake so a client can build the right
/// connection to the shared store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataStoreType {
    BinaryXstream,
    H2Database,
    HsqlDatabase,
    Xml,
}

impl DataStoreType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataStoreType::BinaryXstream => "BINARY_XSTREAM",
            DataStoreType::H2Database => "H2_DATABASE",
            DataStoreType::HsqlDatabase => "HSQL_DATABASE",
            DataStoreType::Xml => "XML",
        }
    }

    /// Whether several engines can share this store over the network.
    pub fn supports_remote(&self) -> bool {
        matches!(self, DataStoreType::H2Database | DataStoreType::HsqlDatabase)
    }
}

impl fmt::Display for DataStoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataStoreType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "BINARY_XSTREAM" => Ok(DataStoreType::BinaryXstream),
            "H2_DATABASE" => Ok(DataStoreType::H2Database),
            "HSQL_DATABASE" => Ok(DataStoreType::HsqlDatabase),
            "XML" => Ok(DataStoreType::Xml),
            other => Err(TypeError::UnknownStoreType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wire_names() {
        for t in [
            DataStoreType::BinaryXstream,
            DataStoreType::H2Database,
            DataStoreType::HsqlDatabase,
            DataStoreType::Xml,
        ] {
            assert_eq!(t.as_str().parse::<DataStoreType>().unwrap(), t);
        }
    }

    #[test]
    fn test_unknown_store_type() {
        let err = "DB4O".parse::<DataStoreType>().unwrap_err();
        assert!(matches!(err, TypeError::UnknownStoreType(ref s) if s == "DB4O"));
    }

    #[test]
    fn test_serde_matches_wire_name() {
        let json = serde_json::to_string(&DataStoreType::H2Database).unwrap();
        assert_eq!(json, "\"H2_DATABASE\"");
    }
}

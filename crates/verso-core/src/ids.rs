use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! branded_id {
    ($name:ident, $prefix:expr) => {
        #[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::now_v7()))
            }

            pub fn from_raw(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_owned()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

branded_id!(ChunkId, "chunk");
branded_id!(WordId, "word");
branded_id!(PacketId, "pkt");
branded_id!(PoemId, "poem");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_prefix() {
        assert!(ChunkId::new().as_str().starts_with("chunk_"));
        assert!(WordId::new().as_str().starts_with("word_"));
        assert!(PacketId::new().as_str().starts_with("pkt_"));
        assert!(PoemId::new().as_str().starts_with("poem_"));
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(WordId::new(), WordId::new());
    }

    #[test]
    fn display_and_from_str_roundtrip() {
        let id = PacketId::new();
        let parsed: PacketId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn serializes_as_bare_string() {
        let id = PoemId::from_raw("poem_x");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""poem_x""#);
    }
}

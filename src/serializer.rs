use serde::{Serialize, de::DeserializeOwned};

use crate::{Result, StoreError, config::SerializerKind};

/// The `Serializer` trait is the boundary between typed event payloads and the opaque bytes the
/// event store keeps.
///
/// The store never looks inside a payload: it only moves the bytes produced here together with
/// the event type tag. Any encoding can be plugged in without touching store logic, as long as
/// `deserialize` accepts what `serialize` produced.
///
/// Serializers are plain values passed to whichever component needs one; there is no global
/// instance.
pub trait Serializer: Send + Sync {
    /// The encoding this serializer implements, checked against the configuration at startup.
    fn kind(&self) -> SerializerKind;

    /// Encodes a value into bytes.
    fn serialize<T>(&self, value: &T) -> Result<Vec<u8>>
    where
        T: Serialize + ?Sized;

    /// Decodes bytes previously produced by [`Serializer::serialize`].
    fn deserialize<T>(&self, bytes: &[u8]) -> Result<T>
    where
        T: DeserializeOwned;
}

/// JSON encoding backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Human-readable output, handy when payloads end up in logs.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Serializer for JsonSerializer {
    fn kind(&self) -> SerializerKind {
        if self.pretty {
            SerializerKind::JsonPretty
        } else {
            SerializerKind::Json
        }
    }

    fn serialize<T>(&self, value: &T) -> Result<Vec<u8>>
    where
        T: Serialize + ?Sized,
    {
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };

        encoded.map_err(|e| StoreError::store_failure(None, e))
    }

    fn deserialize<T>(&self, bytes: &[u8]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(bytes).map_err(|e| StoreError::store_failure(None, e))
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::ErrorKind;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Deposit {
        amount: u32,
    }

    #[test]
    fn pretty_output_decodes_like_compact_output() {
        let compact = JsonSerializer::new();
        let pretty = JsonSerializer::pretty();

        let bytes = pretty.serialize(&Deposit { amount: 7 }).unwrap();
        assert!(bytes.contains(&b'\n'));

        let decoded: Deposit = compact.deserialize(&bytes).unwrap();
        assert_eq!(decoded, Deposit { amount: 7 });
        assert_eq!(pretty.kind(), SerializerKind::JsonPretty);
        assert_eq!(compact.kind(), SerializerKind::Json);
    }

    #[test]
    fn garbage_bytes_are_a_store_failure() {
        let err = JsonSerializer::new()
            .deserialize::<Deposit>(b"not json")
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StoreFailure);
    }
}

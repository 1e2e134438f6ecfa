//! Whole-entry decoding for small archives
//!
//! Reads the entire entry into memory and parses it with simd-json. Only
//! used when the entry is known to be small; large catalogs always go
//! through the streaming decoder.

use crate::error::{BakeError, Result};
use crate::types::{RawCatalogEntry, RawSetBody};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;

#[derive(Deserialize)]
struct BufferedDocument {
    data: Option<OrderedEntries>,
}

/// The `data` object, kept in document order
struct OrderedEntries(Vec<RawCatalogEntry>);

impl<'de> Deserialize<'de> for OrderedEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = OrderedEntries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of sets keyed by set code")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, body)) = map.next_entry::<String, RawSetBody>()? {
                    entries.push(body.into_entry(key));
                }
                Ok(OrderedEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// Parse a complete catalog document held in memory
pub fn decode_buffered(mut content: Vec<u8>) -> Result<Vec<RawCatalogEntry>> {
    let document: BufferedDocument = simd_json::serde::from_slice(&mut content).map_err(|e| {
        BakeError::MalformedJson {
            offset: None,
            message: e.to_string(),
        }
    })?;

    document.data.map(|entries| entries.0).ok_or_else(|| BakeError::MalformedJson {
        offset: None,
        message: "document has no `data` member".to_string(),
    })
}

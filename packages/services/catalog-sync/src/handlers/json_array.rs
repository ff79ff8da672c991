use std::cell::Cell;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use futures::stream::{BoxStream, StreamExt};
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::models::*;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

pub type RecordStream = BoxStream<'static, Result<Value>>;

/// Reads a document holding one top-level JSON array and yields its elements
/// one at a time. Parsing runs on a blocking worker; the bounded channel
/// between it and the consumer caps how many records are in memory.
pub struct JsonArrayHandler {
    capacity: usize,
}

impl Default for JsonArrayHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonArrayHandler {
    pub fn new() -> Self {
        Self { capacity: DEFAULT_CHANNEL_CAPACITY }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity: capacity.max(1) }
    }

    pub fn open(&self, path: &Path) -> Result<RecordStream> {
        let file = File::open(path).map_err(|e| {
            SyncError::Source(format!("cannot open {}: {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), "Streaming records from file");
        Ok(self.stream_reader(BufReader::new(file)))
    }

    pub fn stream_reader<R>(&self, reader: R) -> RecordStream
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<Result<Value>>(self.capacity);
        tokio::task::spawn_blocking(move || {
            match parse_array(reader, &tx) {
                Ok(count) => tracing::debug!(record_count = count, "Finished reading record array"),
                Err(e) => {
                    // Delivered in order, after every element parsed before the failure.
                    let _ = tx.blocking_send(Err(e));
                }
            }
        });
        ReceiverStream::new(rx).boxed()
    }
}

/// Forward every array element into `tx`. Stops quietly once the consumer
/// has gone away.
fn parse_array<R: Read>(reader: R, tx: &mpsc::Sender<Result<Value>>) -> Result<u64> {
    let forwarded = Cell::new(0u64);
    let closed = Cell::new(false);
    let mut deserializer = serde_json::Deserializer::from_reader(reader);
    let outcome = (&mut deserializer).deserialize_seq(ElementForwarder { tx, forwarded: &forwarded, closed: &closed });
    if closed.get() {
        return Ok(forwarded.get());
    }
    outcome.map_err(|e| SyncError::Source(format!("invalid record array: {}", e)))?;
    deserializer.end().map_err(|e| SyncError::Source(format!("trailing data after record array: {}", e)))?;
    Ok(forwarded.get())
}

struct ElementForwarder<'a> {
    tx: &'a mpsc::Sender<Result<Value>>,
    forwarded: &'a Cell<u64>,
    closed: &'a Cell<bool>,
}

impl<'de, 'a> Visitor<'de> for ElementForwarder<'a> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON array of records")
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        while let Some(item) = seq.next_element::<Value>()? {
            if self.tx.blocking_send(Ok(item)).is_err() {
                self.closed.set(true);
                return Err(de::Error::custom("record consumer closed"));
            }
            self.forwarded.set(self.forwarded.get() + 1);
        }
        Ok(())
    }
}

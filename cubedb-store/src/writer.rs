//! Write strategies.
//!
//! [`BatchWriter`](crate::batch::BatchWriter) is the primary writer.
//! During a table migration a [`DualWriter`] wraps the primary and a
//! legacy writer and fans every write out to both; code that holds a
//! `dyn Writer` never knows the difference.

use std::sync::Arc;

use async_trait::async_trait;

use cubedb_core::error::Result;
use cubedb_core::traits::Writer;
use cubedb_core::types::WriteRequest;

/// Fans each write set out to a primary and a legacy writer.
pub struct DualWriter {
    primary: Arc<dyn Writer>,
    legacy: Arc<dyn Writer>,
}

impl DualWriter {
    pub fn new(primary: Arc<dyn Writer>, legacy: Arc<dyn Writer>) -> Self {
        Self { primary, legacy }
    }
}

#[async_trait]
impl Writer for DualWriter {
    async fn write(&self, writes: Vec<WriteRequest>) -> Result<()> {
        let (primary, legacy) = tokio::join!(
            self.primary.write(writes.clone()),
            self.legacy.write(writes)
        );
        primary?;
        legacy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubedb_core::types::{Row, RowKey};
    use parking_lot::Mutex;

    struct RecordingWriter {
        written: Mutex<Vec<WriteRequest>>,
    }

    impl RecordingWriter {
        fn new() -> Self {
            Self {
                written: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Writer for RecordingWriter {
        async fn write(&self, writes: Vec<WriteRequest>) -> Result<()> {
            self.written.lock().extend(writes);
            Ok(())
        }
    }

    #[tokio::test]
    async fn dual_writer_fans_out() {
        let primary = Arc::new(RecordingWriter::new());
        let legacy = Arc::new(RecordingWriter::new());
        let dual = DualWriter::new(primary.clone(), legacy.clone());

        let writes = vec![WriteRequest::Put(Row::new(
            RowKey::new("A", "T"),
            serde_json::json!({}),
        ))];
        dual.write(writes.clone()).await.unwrap();

        assert_eq!(*primary.written.lock(), writes);
        assert_eq!(*legacy.written.lock(), writes);
    }
}

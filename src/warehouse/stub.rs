// In-memory WarehouseClient test double.
//
// Lets Strategy Selector / Query Builder / Streaming ETL Engine tests run
// without a real warehouse: rows are seeded up front and replayed in pages.
use crate::domain::RowBatch;
use crate::error::Result;
use crate::warehouse::client::{RowPageStream, WarehouseClient};
use futures::stream;
use std::sync::Mutex;
use std::time::Duration;

pub struct StubWarehouse {
    /// All rows this stub would ever return, keyed by the exact SQL string
    /// a caller passes to `stream`. Tests assert on the SQL shape via a
    /// simpler key (e.g. "contains archivo = '...'") by pre-registering
    /// the right rows under the query they expect the builder to produce.
    rows_by_query: Mutex<std::collections::HashMap<String, RowBatch>>,
    fallback_rows: RowBatch,
}

impl StubWarehouse {
    pub fn new(fallback_rows: RowBatch) -> Self {
        Self {
            rows_by_query: Mutex::new(std::collections::HashMap::new()),
            fallback_rows,
        }
    }

    pub fn register(&self, sql: impl Into<String>, rows: RowBatch) {
        self.rows_by_query.lock().unwrap().insert(sql.into(), rows);
    }
}

#[async_trait::async_trait]
impl WarehouseClient for StubWarehouse {
    async fn stream(&self, sql: &str, page_size: usize) -> Result<RowPageStream> {
        let rows = self
            .rows_by_query
            .lock()
            .unwrap()
            .get(sql)
            .cloned()
            .unwrap_or_else(|| self.fallback_rows.clone());

        let pages: Vec<Result<RowBatch>> = rows
            .chunks(page_size.max(1))
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();

        Ok(Box::pin(stream::iter(pages)))
    }

    async fn test_connection(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Row, RowValue};
    use futures::StreamExt;

    fn row(key: i64) -> Row {
        let mut r = Row::new();
        r.insert("id".to_string(), RowValue::Int(key));
        r
    }

    #[tokio::test]
    async fn replays_registered_rows_in_pages() {
        let stub = StubWarehouse::new(Vec::new());
        stub.register("SELECT 1", vec![row(1), row(2), row(3)]);

        let mut stream = stub.stream("SELECT 1", 2).await.unwrap();
        let mut pages = Vec::new();
        while let Some(page) = stream.next().await {
            pages.push(page.unwrap().len());
        }
        assert_eq!(pages, vec![2, 1]);
    }

    #[tokio::test]
    async fn falls_back_to_default_rows_for_unregistered_queries() {
        let stub = StubWarehouse::new(vec![row(1)]);
        let mut stream = stub.stream("SELECT unrelated", 10).await.unwrap();
        let page = stream.next().await.unwrap().unwrap();
        assert_eq!(page.len(), 1);
    }
}

use neo4rs::{ConfigBuilder, Graph, Query, Row};
use tracing::debug;

/// Directory lookups return a handful of rows each.
const FETCH_SIZE: usize = 50;
const MAX_CONNECTIONS: usize = 4;

/// Read-only connection to the tenant graph. Clones share one pool.
#[derive(Clone)]
pub struct GraphClient {
    pub(crate) graph: Graph,
}

impl GraphClient {
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self, neo4rs::Error> {
        let config = ConfigBuilder::default()
            .uri(uri)
            .user(user)
            .password(password)
            .fetch_size(FETCH_SIZE)
            .max_connections(MAX_CONNECTIONS)
            .build()?;
        let graph = Graph::connect(config).await?;
        debug!(uri, "Graph directory connected");
        Ok(Self { graph })
    }

    /// Run a read query, stopping after `limit` rows when given.
    pub(crate) async fn rows(&self, q: Query, limit: Option<usize>) -> Result<Vec<Row>, neo4rs::Error> {
        let mut stream = self.graph.execute(q).await?;
        let mut rows = Vec::new();
        while limit.is_none_or(|n| rows.len() < n) {
            match stream.next().await? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok(rows)
    }
}

use std::future::IntoFuture;

use folio_core::{to_object, Envelope, Record, ShimError};
use http::Method;
use serde_json::Value;
use tracing::warn;

use super::ShimFuture;
use crate::db::Db;
use crate::exec::{decode_row, execute, CallOptions};
use crate::transport::ApiRequest;

/// Inserts `rows` with one `POST` each, strictly in order.
///
/// Stops at the first failure. Rows before it have been stored and are not
/// rolled back. A row the server does not echo is returned as sent.
pub(super) async fn insert_rows<T: Record>(
    db: &Db,
    table: &str,
    rows: Vec<T>,
    opts: &CallOptions,
) -> Result<Vec<T>, ShimError> {
    let mut inserted = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        let stored = post_row(db, table, row, opts).await.inspect_err(|err| {
            warn!(
                table,
                index,
                committed = inserted.len(),
                error = %err,
                "insert stopped; earlier rows remain stored"
            );
        })?;
        inserted.push(stored);
    }
    Ok(inserted)
}

pub(super) async fn post_row<T: Record>(
    db: &Db,
    table: &str,
    row: T,
    opts: &CallOptions,
) -> Result<T, ShimError> {
    let body = to_object(&row).map_err(ShimError::encode)?;
    let request = ApiRequest::collection(Method::POST, table).with_json(Value::Object(body));
    let response = execute(db.transport(), request, opts).await?;
    Ok(decode_row(response.data)?.unwrap_or(row))
}

/// Single-row insert, or a multi-row insert narrowed with `.single()`.
/// Resolves to the first stored row.
#[must_use = "a query does nothing until awaited"]
pub struct InsertQuery<T> {
    db: Db,
    table: String,
    rows: Vec<T>,
    pub(super) opts: CallOptions,
}

impl<T: Record> InsertQuery<T> {
    pub(crate) fn new(db: Db, table: String, rows: Vec<T>) -> Self {
        let opts = db.write_options();
        Self {
            db,
            table,
            rows,
            opts,
        }
    }
}

/// Multi-row insert. Resolves to every stored row, or to an error with no
/// data if any row fails.
#[must_use = "a query does nothing until awaited"]
pub struct InsertManyQuery<T> {
    db: Db,
    table: String,
    rows: Vec<T>,
    pub(super) opts: CallOptions,
}

impl<T: Record> InsertManyQuery<T> {
    pub(crate) fn new(db: Db, table: String, rows: Vec<T>) -> Self {
        let opts = db.write_options();
        Self {
            db,
            table,
            rows,
            opts,
        }
    }

    /// Still inserts every row, but resolves to the first one only.
    pub fn single(self) -> InsertQuery<T> {
        InsertQuery {
            db: self.db,
            table: self.table,
            rows: self.rows,
            opts: self.opts,
        }
    }
}

impl<T: Record> IntoFuture for InsertQuery<T> {
    type Output = Envelope<T>;
    type IntoFuture = ShimFuture<T>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let result = insert_rows(&self.db, &self.table, self.rows, &self.opts)
                .await
                .map(|rows| rows.into_iter().next());
            Envelope::from_optional(result)
        })
    }
}

impl<T: Record> IntoFuture for InsertManyQuery<T> {
    type Output = Envelope<Vec<T>>;
    type IntoFuture = ShimFuture<Vec<T>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            Envelope::from(insert_rows(&self.db, &self.table, self.rows, &self.opts).await)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use folio_core::{DynamicRow, Skill};
    use http::StatusCode;
    use serde_json::json;

    use crate::testing::MockTransport;
    use crate::transport::Body;
    use crate::{ClientConfig, Db};

    fn db_with(mock: &Arc<MockTransport>) -> Db {
        Db::with_transport(mock.clone(), ClientConfig::new("http://api.test"))
    }

    fn skill(name: &str) -> Skill {
        Skill {
            name: name.into(),
            category: "backend".into(),
            proficiency: 80,
            ..Skill::default()
        }
    }

    #[tokio::test]
    async fn insert_posts_row_and_returns_server_row() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(
            StatusCode::CREATED,
            json!({ "data": { "id": "s1", "name": "Rust", "category": "backend", "proficiency": 80, "updated_at": 5 } }),
        );
        let env = db_with(&mock).from::<Skill>().insert(skill("Rust")).await;

        let row = env.data().unwrap();
        assert_eq!(row.id.as_deref(), Some("s1"));
        assert_eq!(row.updated_at, Some(5));

        let request = mock.last_request().unwrap();
        assert_eq!(request.method, http::Method::POST);
        assert_eq!(request.path(), "/db/skills");
        match request.body {
            Body::Json(body) => assert_eq!(body["name"], "Rust"),
            other => panic!("expected JSON body, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn insert_without_echo_returns_sent_row() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(StatusCode::CREATED, json!({}));
        let env = db_with(&mock).from::<Skill>().insert(skill("Go")).await;
        assert_eq!(env.data().unwrap().name, "Go");
    }

    #[tokio::test]
    async fn insert_many_is_one_request_per_row_in_order() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(StatusCode::CREATED, json!({ "data": { "id": "1", "n": "a" } }));
        mock.push_json(StatusCode::CREATED, json!({ "data": { "id": "2", "n": "b" } }));
        mock.push_json(StatusCode::CREATED, json!({ "data": { "id": "3", "n": "c" } }));

        let rows = ["a", "b", "c"]
            .iter()
            .map(|n| DynamicRow::new().with("n", *n))
            .collect();
        let env = db_with(&mock).table::<DynamicRow>("t").insert_many(rows).await;

        let ids: Vec<_> = env.data().unwrap().iter().map(|r| r.get("id").cloned()).collect();
        assert_eq!(ids, vec![Some(json!("1")), Some(json!("2")), Some(json!("3"))]);

        let sent: Vec<_> = mock
            .requests()
            .into_iter()
            .map(|r| match r.body {
                Body::Json(body) => body["n"].clone(),
                _ => json!(null),
            })
            .collect();
        assert_eq!(sent, vec![json!("a"), json!("b"), json!("c")]);
    }

    #[tokio::test]
    async fn insert_many_stops_at_first_failure() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(StatusCode::CREATED, json!({ "data": { "id": "1" } }));
        mock.push_json(StatusCode::CONFLICT, json!({ "error": "duplicate id" }));

        let rows = vec![
            DynamicRow::new().with("n", "a"),
            DynamicRow::new().with("n", "b"),
            DynamicRow::new().with("n", "c"),
        ];
        let env = db_with(&mock).table::<DynamicRow>("t").insert_many(rows).await;

        assert!(env.data().is_none());
        assert_eq!(env.error().unwrap().message(), "duplicate id");
        assert_eq!(mock.request_count(), 2, "third row must not be sent");
    }

    #[tokio::test]
    async fn insert_many_single_returns_first() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(StatusCode::CREATED, json!({ "data": { "id": "1" } }));
        mock.push_json(StatusCode::CREATED, json!({ "data": { "id": "2" } }));

        let rows = vec![DynamicRow::new(), DynamicRow::new()];
        let env = db_with(&mock)
            .table::<DynamicRow>("t")
            .insert_many(rows)
            .single()
            .await;
        assert_eq!(env.data().unwrap().get("id"), Some(&json!("1")));
        assert_eq!(mock.request_count(), 2);
    }

    #[tokio::test]
    async fn writes_are_not_retried() {
        let mock = Arc::new(MockTransport::new());
        mock.push_error(folio_core::ShimError::transport("reset"));
        let env = db_with(&mock).from::<Skill>().insert(skill("Rust")).await;
        assert!(env.error().is_some());
        assert_eq!(mock.request_count(), 1);
    }
}

use async_trait::async_trait;
use cluster_init::{
    ClusterInitService, ColumnSpec, Credentials, DatabaseConnector, DbError, InitError,
    ProbeIdGenerator, ProbeRow, RawConnection, ResultEnvelope, SchemaBuilder, SecretId,
    SecretStore, SecretStoreError, TableName,
};
use mockall::mock;
use serde_json::json;

mock! {
    pub Store {}

    #[async_trait]
    impl SecretStore for Store {
        async fn get_secret(&self, id: &SecretId) -> Result<String, SecretStoreError>;
    }
}

mock! {
    pub Connection {}

    #[async_trait]
    impl RawConnection for Connection {
        async fn query(&self, sql: &str) -> Result<(), DbError>;
    }
}

mock! {
    pub Schema {}

    #[async_trait]
    impl SchemaBuilder for Schema {
        async fn create_table(&self, table: &TableName, columns: &[ColumnSpec]) -> Result<(), DbError>;
        async fn insert(&self, table: &TableName, row: &ProbeRow) -> Result<u64, DbError>;
        async fn select(&self, table: &TableName, columns: &[ColumnSpec]) -> Result<Vec<ProbeRow>, DbError>;
    }
}

mock! {
    pub Connector {}

    #[async_trait]
    impl DatabaseConnector for Connector {
        async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn RawConnection>, DbError>;
        fn schema_builder(&self, credentials: &Credentials) -> Box<dyn SchemaBuilder>;
    }
}

struct FixedIds {
    table: &'static str,
    row_id: i32,
}

impl ProbeIdGenerator for FixedIds {
    fn table_name(&self) -> TableName {
        TableName::new(self.table)
    }

    fn row_id(&self) -> i32 {
        self.row_id
    }
}

const SECRET_ARN: &str = "arn:aws:secretsmanager:us-east-1:123456789012:secret:test-cluster";

fn store_with_secret() -> MockStore {
    let mut store = MockStore::new();
    store
        .expect_get_secret()
        .withf(|id| id.as_str() == SECRET_ARN)
        .times(1)
        .returning(|_| {
            Ok(json!({
                "host": "h",
                "port": 5432,
                "dbname": "d",
                "username": "u",
                "password": "p"
            })
            .to_string())
        });
    store
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    // Extension setup goes through the default ensure_extension.
    let mut connection = MockConnection::new();
    connection
        .expect_query()
        .withf(|sql| sql == "CREATE EXTENSION IF NOT EXISTS \"ltree\"")
        .times(1)
        .returning(|_| Ok(()));

    let mut schema = MockSchema::new();
    schema
        .expect_create_table()
        .withf(|table, columns| {
            table.as_str() == "abc-123"
                && columns.iter().map(|c| c.name).collect::<Vec<_>>() == ["id", "name", "testLTree"]
        })
        .times(1)
        .returning(|_, _| Ok(()));
    schema
        .expect_insert()
        .withf(|table, row| table.as_str() == "abc-123" && row.id == 42)
        .times(1)
        .returning(|_, _| Ok(1));
    schema
        .expect_select()
        .times(1)
        .returning(|_, _| {
            Ok(vec![ProbeRow {
                id: 42,
                name: "Name of 42".to_string(),
                test_ltree: "42".to_string(),
            }])
        });

    let mut connector = MockConnector::new();
    connector
        .expect_connect()
        .withf(|c| {
            c.host == "h" && c.port == 5432 && c.database == "d" && c.username == "u" && c.password == "p"
        })
        .times(1)
        .return_once(move |_| Ok(Box::new(connection) as Box<dyn RawConnection>));
    connector
        .expect_schema_builder()
        .times(1)
        .return_once(move |_| Box::new(schema) as Box<dyn SchemaBuilder>);

    let service = ClusterInitService::builder()
        .secret_store(store_with_secret())
        .connector(connector)
        .id_generator(FixedIds {
            table: "abc-123",
            row_id: 42,
        })
        .secret_id(SecretId::new(SECRET_ARN).unwrap())
        .build();

    let rows = service.initialize().await.unwrap();
    assert_eq!(rows, vec![ProbeRow::for_id(42)]);
    assert_eq!(rows[0].test_ltree, rows[0].id.to_string());
}

#[tokio::test]
async fn test_extension_query_failure_still_creates_table() {
    let mut connection = MockConnection::new();
    connection
        .expect_query()
        .times(1)
        .returning(|_| {
            Err(DbError::with_code(
                "42501",
                "permission denied to create extension \"ltree\"",
            ))
        });

    let mut schema = MockSchema::new();
    schema
        .expect_create_table()
        .times(1)
        .returning(|_, _| Err(DbError::with_code("42704", "type \"ltree\" does not exist")));
    schema.expect_insert().never();
    schema.expect_select().never();

    let mut connector = MockConnector::new();
    connector
        .expect_connect()
        .times(1)
        .return_once(move |_| Ok(Box::new(connection) as Box<dyn RawConnection>));
    connector
        .expect_schema_builder()
        .times(1)
        .return_once(move |_| Box::new(schema) as Box<dyn SchemaBuilder>);

    let service = ClusterInitService::builder()
        .secret_store(store_with_secret())
        .connector(connector)
        .id_generator(FixedIds {
            table: "t",
            row_id: 1,
        })
        .secret_id(SecretId::new(SECRET_ARN).unwrap())
        .build();

    let envelope = service.run_initialization().await;
    assert_eq!(envelope.status_code, 500);
    assert_eq!(
        envelope.body,
        r#"Error creating table: {"code":"42704","message":"type \"ltree\" does not exist"}"#
    );
}

#[tokio::test]
async fn test_secret_store_failure_returns_fixed_message() {
    let mut store = MockStore::new();
    store
        .expect_get_secret()
        .times(1)
        .returning(|id| Err(SecretStoreError::MissingSecretString(id.to_string())));

    let mut connector = MockConnector::new();
    connector.expect_connect().never();

    let service = ClusterInitService::builder()
        .secret_store(store)
        .connector(connector)
        .id_generator(FixedIds {
            table: "t",
            row_id: 1,
        })
        .secret_id(SecretId::new(SECRET_ARN).unwrap())
        .build();

    let envelope = service.run_initialization().await;
    assert_eq!(
        envelope,
        ResultEnvelope {
            status_code: 500,
            body: "Error fetching secret from SecretsManager".to_string(),
        }
    );
}

#[test]
fn test_blank_secret_id_is_rejected() {
    let err = SecretId::new("").unwrap_err();
    assert!(matches!(err, InitError::Configuration(_)));
}

#[test]
fn test_envelope_json_structure() {
    let json = serde_json::to_value(ResultEnvelope::success()).unwrap();

    assert_eq!(json["statusCode"], 200);
    assert_eq!(json["body"], "Success");
    assert_eq!(json.as_object().unwrap().len(), 2);

    let failure = serde_json::to_value(ResultEnvelope::from(InitError::Insert(DbError::new(
        "relation does not exist",
    ))))
    .unwrap();
    assert_eq!(
        failure,
        json!({
            "statusCode": 500,
            "body": "Error inserting row: {\"message\":\"relation does not exist\"}"
        })
    );
}

use cluster_init::{
    ClusterInitService, Config, PostgresConnector, RandomProbeIds, ResultEnvelope,
    SecretsManagerStore,
};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing::info;

type InitService = ClusterInitService<SecretsManagerStore, PostgresConnector, RandomProbeIds>;

async fn function_handler(
    service: &InitService,
    event: LambdaEvent<Value>,
) -> Result<ResultEnvelope, Error> {
    info!("Initialization requested ({})", event.context.request_id);
    Ok(service.run_initialization().await)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let config = Config::load()?;

    let service = ClusterInitService::builder()
        .secret_store(SecretsManagerStore::from_env().await)
        .connector(PostgresConnector)
        .id_generator(RandomProbeIds)
        .secret_id(config.secret_id)
        .build();

    run(service_fn(|event| function_handler(&service, event))).await
}

//! Demo server: runs the full request pipeline in front of an echo handler,
//! backed by in-memory audit and usage stores.
//!
//! ```bash
//! BUILDING_MODE=test demo-server --jwt-secret foo \
//!     --product-id 40bb5b9b-0b3d-40f0-932f-2969200660d5 \
//!     --entitlement-url http://localhost:9000/groups/
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::error_handling::HandleError;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use clap::Parser;
use tollgate_core::{BuildMode, ClaimsEncoding};
use tollgate_server::clients::{
    HttpEntitlementSource, MemoryAuditSink, MemorySecretStore, MemoryUsageQueue,
    StaticEntitlementSource,
};
use tollgate_server::network::{NetworkConfig, NetworkModule};
use tollgate_server::service::config::usage_queue_name;
use tollgate_server::service::middleware::{AuditLayer, ContextLayer, EntitlementLayer, UsageLayer};
use tollgate_server::service::{AuditConfig, ContextConfig, EntitlementConfig, UsageConfig};
use tollgate_server::{
    build_pipeline, fetch_signing_key, EntitlementSource, JwtLayer, PipelineError, PipelineLayers,
    Rejection, RequestContext,
};
use tower::{service_fn, Layer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "demo-server")]
#[command(about = "Request pipeline demo server", long_about = None)]
struct Args {
    /// Deployment tier: test, dev or prod
    #[arg(long, env = "BUILDING_MODE", default_value = "dev")]
    mode: BuildMode,

    #[arg(long, env = "TOLLGATE_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "TOLLGATE_PORT", default_value_t = 8080)]
    port: u16,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    request_timeout: u64,

    #[arg(long, env = "AUDIT_TABLE", default_value = "audit-records")]
    audit_table: String,

    #[arg(long, env = "PRODUCT_ID")]
    product_id: Uuid,

    #[arg(long, env = "MEMORY_MB", default_value = "1024")]
    memory_mb: String,

    /// Overrides the build mode's usage queue
    #[arg(long, env = "USAGE_QUEUE")]
    usage_queue: Option<String>,

    /// Overrides the build mode's entitlement service URL
    #[arg(long, env = "ENTITLEMENT_URL")]
    entitlement_url: Option<String>,

    /// Required roles; the built-in defaults apply when empty
    #[arg(long, value_delimiter = ',')]
    roles: Vec<String>,

    /// Grant every caller these groups instead of calling the entitlement service
    #[arg(long, value_delimiter = ',')]
    grant: Vec<String>,

    /// HS256 secret, stored under the build mode's signing key name
    #[arg(long, env = "JWT_SECRET")]
    jwt_secret: String,

    /// Decode claims as a flat bundle instead of nested user/app objects
    #[arg(long)]
    bundle_claims: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tollgate_server=debug,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn echo_caller(ctx: RequestContext<Body>) -> Result<Response, PipelineError> {
    Ok(Json(ctx.caller().clone()).into_response())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let secrets = MemorySecretStore::new()
        .with_secret(args.mode.signing_key_name(), args.jwt_secret.clone());
    let signing_key = fetch_signing_key(&secrets, args.mode).await?;

    let entitlement_source: Arc<dyn EntitlementSource> = if args.grant.is_empty() {
        Arc::new(HttpEntitlementSource::new(Duration::from_secs(10))?)
    } else {
        Arc::new(StaticEntitlementSource::new(args.grant.clone()))
    };
    let queue_name = usage_queue_name(args.mode, args.usage_queue.as_deref());

    let layers = PipelineLayers {
        context: ContextLayer::new(ContextConfig {
            encoding: if args.bundle_claims {
                ClaimsEncoding::Bundle
            } else {
                ClaimsEncoding::Nested
            },
            ..ContextConfig::default()
        }),
        audit: AuditLayer::new(
            Arc::new(MemoryAuditSink::new()),
            AuditConfig::new(args.audit_table.clone())?,
        )?,
        usage: UsageLayer::new(
            Arc::new(MemoryUsageQueue::new(queue_name.clone())),
            UsageConfig::new(args.product_id, args.memory_mb.clone())?,
        ),
        entitlement: EntitlementLayer::new(
            entitlement_source,
            EntitlementConfig::resolve(
                args.roles.clone(),
                args.entitlement_url.clone(),
                args.mode,
            )?,
        ),
    };

    let pipeline = JwtLayer::from_secret(signing_key.as_bytes())
        .layer(build_pipeline(layers, service_fn(echo_caller)));
    let pipeline = HandleError::new(pipeline, |rejection: Rejection| async move {
        rejection.into_response()
    });
    let api = Router::new().fallback_service(pipeline);

    tracing::info!(
        mode = %args.mode,
        usage_queue = %queue_name,
        audit_table = %args.audit_table,
        "pipeline configured"
    );

    let mut module = NetworkModule::new(NetworkConfig {
        host: args.host,
        port: args.port,
        request_timeout: Duration::from_secs(args.request_timeout),
    });
    module.start().await?;
    module
        .serve(api, async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
}

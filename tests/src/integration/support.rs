//! Shared fixtures for the end-to-end flows.

use qrpc_remoting::{
    InvokerConfig, InvokerFactory, JsonCodec, LocalNetwork, LocalServiceRegistry, ProviderConfig,
    ProviderFactory, ReferenceConfig, RpcReference, ServiceBean,
};
use qrpc_telemetry::{init_logging, TelemetryConfig};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub const ECHO: &str = "Echo";
pub const V1: &str = "v1";

/// Install a quiet subscriber; only the first test in the binary wins
pub fn init_test_logging() {
    let config = TelemetryConfig {
        log_level: "warn".to_string(),
        ..TelemetryConfig::for_service("qrpc-tests")
    };
    let _ = init_logging(&config);
}

pub fn network() -> Arc<LocalNetwork> {
    init_test_logging();
    Arc::new(LocalNetwork::new(Arc::new(JsonCodec)))
}

/// Echo#v1 as served at `address`.
///
/// - `echo(String)` returns its argument
/// - `add(int,int)` sums
/// - `whoami()` returns the serving address
/// - `slow(long)` sleeps that many milliseconds
pub fn echo_service(address: &str) -> ServiceBean {
    let me = address.to_string();
    ServiceBean::new()
        .typed_method("echo", &["String"], |(text,): (String,)| Ok(text))
        .typed_method("add", &["int", "int"], |(a, b): (i64, i64)| Ok(a + b))
        .method("whoami", &[], move |_| Ok(json!(me)))
        .typed_method("slow", &["long"], |(millis,): (u64,)| {
            std::thread::sleep(Duration::from_millis(millis));
            Ok(millis)
        })
}

pub fn provider(
    config: ProviderConfig,
    registry: Option<Arc<LocalServiceRegistry>>,
) -> ProviderFactory {
    let address = config.address.clone();
    let mut provider = ProviderFactory::new(config).unwrap();
    if let Some(registry) = registry {
        provider = provider.with_registry(registry);
    }
    provider.add_service(ECHO, Some(V1), echo_service(&address));
    provider
}

/// Provider serving Echo#v1 at `address`, already bound
pub async fn start_provider(
    network: &Arc<LocalNetwork>,
    address: &str,
    registry: Option<Arc<LocalServiceRegistry>>,
) -> ProviderFactory {
    let provider = provider(ProviderConfig::new(address), registry);
    provider.start(network.clone()).await.unwrap();
    provider
}

pub async fn invoker(registry: Option<Arc<LocalServiceRegistry>>) -> Arc<InvokerFactory> {
    let mut factory = InvokerFactory::new(InvokerConfig::default()).unwrap();
    if let Some(registry) = registry {
        factory = factory.with_registry(registry);
    }
    factory.start().await.unwrap();
    Arc::new(factory)
}

pub fn reference(
    factory: &Arc<InvokerFactory>,
    network: &Arc<LocalNetwork>,
    config: ReferenceConfig,
) -> RpcReference {
    RpcReference::new(config, factory.clone(), network.clone()).unwrap()
}

pub fn echo_config(address: &str) -> ReferenceConfig {
    ReferenceConfig::new(ECHO)
        .with_version(V1)
        .with_address(address)
}

/// Poll `condition` until it holds or a second passes
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

//! # Registry Discovery and Load Balancing
//!
//! Providers publish Echo#v1 to a shared [`LocalServiceRegistry`]; references
//! without a static address resolve through it.

use super::support::*;
use qrpc_remoting::{
    CallOptions, LoadBalance, LocalServiceRegistry, ReferenceConfig, RpcError, RpcReference,
    ServiceKey, ServiceRegistry,
};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

async fn whoami(reference: &RpcReference) -> String {
    let value = reference
        .invoke("whoami", &[], vec![], CallOptions::default())
        .await
        .unwrap()
        .into_value();
    match value {
        Some(Value::String(address)) => address,
        other => panic!("unexpected whoami reply: {other:?}"),
    }
}

async fn served_by(reference: &RpcReference, calls: usize) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    for _ in 0..calls {
        seen.insert(whoami(reference).await);
    }
    seen
}

#[tokio::test]
async fn test_providers_publish_on_start_and_withdraw_on_stop() {
    let network = network();
    let registry = Arc::new(LocalServiceRegistry::new());
    let key = ServiceKey::make(ECHO, Some(V1));

    let a = start_provider(&network, "local:a", Some(registry.clone())).await;
    let _b = start_provider(&network, "local:b", Some(registry.clone())).await;
    assert_eq!(
        registry.discover(&key),
        BTreeSet::from(["local:a".to_string(), "local:b".to_string()])
    );

    a.stop().await;
    assert!(!network.is_bound("local:a"));
    assert_eq!(registry.discover(&key), BTreeSet::from(["local:b".to_string()]));
}

#[tokio::test]
async fn test_round_robin_spreads_across_providers() {
    let network = network();
    let registry = Arc::new(LocalServiceRegistry::new());
    let _a = start_provider(&network, "local:a", Some(registry.clone())).await;
    let _b = start_provider(&network, "local:b", Some(registry.clone())).await;

    let factory = invoker(Some(registry)).await;
    let echo = reference(
        &factory,
        &network,
        ReferenceConfig::new(ECHO)
            .with_version(V1)
            .with_load_balance(LoadBalance::Round),
    );

    // Consecutive round-robin picks alternate between the two addresses
    let first = whoami(&echo).await;
    let second = whoami(&echo).await;
    assert_ne!(first, second);
    assert_eq!(whoami(&echo).await, first);
}

#[tokio::test]
async fn test_consistent_hash_pins_one_provider() {
    let network = network();
    let registry = Arc::new(LocalServiceRegistry::new());
    let _a = start_provider(&network, "local:a", Some(registry.clone())).await;
    let _b = start_provider(&network, "local:b", Some(registry.clone())).await;
    let _c = start_provider(&network, "local:c", Some(registry.clone())).await;

    let factory = invoker(Some(registry)).await;
    let echo = reference(
        &factory,
        &network,
        ReferenceConfig::new(ECHO)
            .with_version(V1)
            .with_load_balance(LoadBalance::ConsistentHash),
    );

    assert_eq!(served_by(&echo, 10).await.len(), 1);
}

#[tokio::test]
async fn test_every_policy_routes_to_a_live_provider() {
    let network = network();
    let registry = Arc::new(LocalServiceRegistry::new());
    let _a = start_provider(&network, "local:a", Some(registry.clone())).await;
    let _b = start_provider(&network, "local:b", Some(registry.clone())).await;
    let factory = invoker(Some(registry)).await;

    let live = BTreeSet::from(["local:a".to_string(), "local:b".to_string()]);
    for policy in LoadBalance::ALL {
        let echo = reference(
            &factory,
            &network,
            ReferenceConfig::new(ECHO)
                .with_version(V1)
                .with_load_balance(policy),
        );
        let seen = served_by(&echo, 6).await;
        assert!(seen.is_subset(&live), "{policy:?} routed outside {live:?}: {seen:?}");
    }
}

#[tokio::test]
async fn test_static_address_bypasses_registry() {
    let network = network();
    let registry = Arc::new(LocalServiceRegistry::new());
    let _a = start_provider(&network, "local:a", None).await;
    let _b = start_provider(&network, "local:b", Some(registry.clone())).await;

    let factory = invoker(Some(registry)).await;
    let echo = reference(&factory, &network, echo_config(" local:a "));

    assert_eq!(served_by(&echo, 4).await, BTreeSet::from(["local:a".to_string()]));
}

#[tokio::test]
async fn test_unregistered_service_is_unresolved() {
    let network = network();
    let registry = Arc::new(LocalServiceRegistry::new());
    let factory = invoker(Some(registry)).await;
    let echo = reference(
        &factory,
        &network,
        ReferenceConfig::new(ECHO).with_version(V1),
    );

    let err = echo
        .invoke("whoami", &[], vec![], CallOptions::default())
        .await
        .unwrap_err();
    match err {
        RpcError::AddressUnresolved { service_key } => assert_eq!(service_key.as_str(), "Echo#v1"),
        other => panic!("expected unresolved address, got {other:?}"),
    }
    assert_eq!(factory.call_table().pending_count(), 0);
}

#[tokio::test]
async fn test_no_registry_and_no_address_is_unresolved() {
    let network = network();
    let factory = invoker(None).await;
    let echo = reference(
        &factory,
        &network,
        ReferenceConfig::new(ECHO).with_address("   "),
    );

    let err = echo
        .invoke("whoami", &[], vec![], CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::AddressUnresolved { .. }));
}

//! # Call Semantics End to End
//!
//! Each call type against a bound Echo#v1 provider:
//!
//! | Call type | Expectation |
//! |-----------|-------------|
//! | SYNC      | value returned, no correlation entry left |
//! | FUTURE    | handle resolves, entries removed as handles finish |
//! | CALLBACK  | callback gets the outcome on the callback pool |
//! | ONEWAY    | provider runs the method and sends no reply |

use super::support::*;
use futures::future::join_all;
use qrpc_remoting::{
    CallOptions, CallType, FnCallback, GenericCall, InvokeCallback, ProviderConfig,
    ReferenceConfig, RpcError, ServiceBean, Transport,
};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

const ADDRESS: &str = "local:7080";

fn outcome_callback(
    tx: mpsc::UnboundedSender<Result<Value, RpcError>>,
) -> Arc<dyn InvokeCallback> {
    let failures = tx.clone();
    FnCallback::new(
        move |value: Value| {
            let _ = tx.send(Ok(value));
        },
        move |error: RpcError| {
            let _ = failures.send(Err(error));
        },
    )
}

// =============================================================================
// SYNC
// =============================================================================

#[tokio::test]
async fn test_sync_echo_round_trip() {
    let network = network();
    let _provider = start_provider(&network, ADDRESS, None).await;
    let factory = invoker(None).await;
    let echo = reference(&factory, &network, echo_config(ADDRESS));

    let reply = echo
        .invoke("echo", &["String"], vec![json!("hi")], CallOptions::default())
        .await
        .unwrap();

    assert_eq!(reply.into_value(), Some(json!("hi")));
    assert_eq!(factory.call_table().pending_count(), 0);
    assert_eq!(factory.call_table().stats().total_completed.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_sync_remote_error_surfaces_message() {
    let network = network();
    let _provider = start_provider(&network, ADDRESS, None).await;
    let factory = invoker(None).await;
    let echo = reference(&factory, &network, echo_config(ADDRESS));

    let err = echo
        .invoke("shout", &["String"], vec![json!("hi")], CallOptions::default())
        .await
        .unwrap_err();

    match err {
        RpcError::Remote(message) => assert_eq!(message, "No such method: Echo#v1.shout(String)"),
        other => panic!("expected remote error, got {other:?}"),
    }
    assert_eq!(factory.call_table().pending_count(), 0);
}

#[tokio::test]
async fn test_sync_typed_parameters_decode_on_provider() {
    let network = network();
    let _provider = start_provider(&network, ADDRESS, None).await;
    let factory = invoker(None).await;
    let echo = reference(&factory, &network, echo_config(ADDRESS));

    let sum = echo
        .invoke("add", &["int", "int"], vec![json!(2), json!(40)], CallOptions::default())
        .await
        .unwrap()
        .into_value();
    assert_eq!(sum, Some(json!(42)));

    // Wrong shape fails inside the method, not the transport
    let err = echo
        .invoke("add", &["int", "int"], vec![json!("two"), json!(40)], CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RpcError::Remote(ref m) if m.contains("invalid parameters for add(int,int)")
    ));
}

#[tokio::test]
async fn test_generic_call_overrides_reference_metadata() {
    let network = network();
    let provider = start_provider(&network, ADDRESS, None).await;
    provider.add_service(
        "Clock",
        None,
        ServiceBean::new().method("now", &[], |_| Ok(json!(1_700_000_000_000u64))),
    );
    let factory = invoker(None).await;
    let echo = reference(&factory, &network, echo_config(ADDRESS));

    let call = GenericCall {
        iface: "Clock".to_string(),
        version: None,
        method: "now".to_string(),
        parameter_types: vec![],
        parameters: vec![],
    };
    let now = echo
        .invoke_generic(call, CallOptions::default())
        .await
        .unwrap()
        .into_value();
    assert_eq!(now, Some(json!(1_700_000_000_000u64)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sync_calls_share_one_connection() {
    let network = network();
    let _provider = start_provider(&network, ADDRESS, None).await;
    let factory = invoker(None).await;
    let echo = reference(&factory, &network, echo_config(ADDRESS));

    let echo = &echo;
    let calls = (0..64).map(|i| async move {
        let text = format!("message-{i}");
        let reply = echo
            .invoke("echo", &["String"], vec![json!(text.clone())], CallOptions::default())
            .await
            .unwrap();
        (text, reply.into_value())
    });

    for (sent, received) in join_all(calls).await {
        assert_eq!(received, Some(json!(sent)));
    }
    assert_eq!(factory.call_table().pending_count(), 0);
    let transport: Arc<dyn Transport> = network.clone();
    assert_eq!(factory.pool_for(&transport).len(), 1);
}

// =============================================================================
// FUTURE
// =============================================================================

#[tokio::test]
async fn test_future_handles_resolve_in_any_order() {
    let network = network();
    let _provider = start_provider(&network, ADDRESS, None).await;
    let factory = invoker(None).await;
    let echo = reference(
        &factory,
        &network,
        echo_config(ADDRESS).with_call_type(CallType::Future),
    );

    let mut futures = Vec::new();
    for i in 0..3 {
        let invocation = echo
            .invoke("add", &["int", "int"], vec![json!(i), json!(10)], CallOptions::default())
            .await
            .unwrap();
        futures.push(invocation.into_future().unwrap());
    }

    for (i, future) in futures.iter().enumerate().rev() {
        assert_eq!(future.get().await.unwrap(), json!(i as i64 + 10));
        assert!(future.is_done());
    }
    drop(futures);
    assert_eq!(factory.call_table().pending_count(), 0);
}

#[tokio::test]
async fn test_dropped_future_discards_its_entry() {
    let network = network();
    let _provider = start_provider(&network, ADDRESS, None).await;
    let factory = invoker(None).await;
    let echo = reference(
        &factory,
        &network,
        echo_config(ADDRESS).with_call_type(CallType::Future),
    );

    let future = echo
        .invoke("slow", &["long"], vec![json!(100)], CallOptions::default())
        .await
        .unwrap()
        .into_future()
        .unwrap();
    assert_eq!(factory.call_table().pending_count(), 1);

    drop(future);
    assert_eq!(factory.call_table().pending_count(), 0);

    let table = factory.call_table().clone();
    assert!(eventually(|| table.stats().total_discarded.load(Ordering::Relaxed) == 1).await);
}

// =============================================================================
// CALLBACK
// =============================================================================

#[tokio::test]
async fn test_callback_receives_success() {
    let network = network();
    let _provider = start_provider(&network, ADDRESS, None).await;
    let factory = invoker(None).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let echo = reference(
        &factory,
        &network,
        echo_config(ADDRESS).with_call_type(CallType::Callback),
    )
    .with_callback(outcome_callback(tx));

    let invocation = echo
        .invoke("echo", &["String"], vec![json!("hi")], CallOptions::default())
        .await
        .unwrap();
    assert!(invocation.is_dispatched());

    let outcome = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    assert_eq!(outcome.unwrap(), json!("hi"));
    assert_eq!(factory.call_table().pending_count(), 0);
}

#[tokio::test]
async fn test_per_call_callback_overrides_default() {
    let network = network();
    let _provider = start_provider(&network, ADDRESS, None).await;
    let factory = invoker(None).await;
    let (default_tx, mut default_rx) = mpsc::unbounded_channel();
    let (call_tx, mut call_rx) = mpsc::unbounded_channel();
    let echo = reference(
        &factory,
        &network,
        echo_config(ADDRESS).with_call_type(CallType::Callback),
    )
    .with_callback(outcome_callback(default_tx));

    echo.invoke(
        "nope",
        &[],
        vec![],
        CallOptions::default().with_callback(outcome_callback(call_tx)),
    )
    .await
    .unwrap();

    let outcome = timeout(Duration::from_secs(2), call_rx.recv()).await.unwrap().unwrap();
    assert!(matches!(
        outcome,
        Err(RpcError::Remote(ref m)) if m == "No such method: Echo#v1.nope()"
    ));
    assert!(default_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_callback_without_any_callback_is_rejected() {
    let network = network();
    let _provider = start_provider(&network, ADDRESS, None).await;
    let factory = invoker(None).await;
    let echo = reference(
        &factory,
        &network,
        echo_config(ADDRESS).with_call_type(CallType::Callback),
    );

    let err = echo
        .invoke("echo", &["String"], vec![json!("hi")], CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::CallbackMissing));
    assert_eq!(factory.call_table().stats().total_registered.load(Ordering::Relaxed), 0);
}

// =============================================================================
// ONEWAY
// =============================================================================

#[tokio::test]
async fn test_oneway_runs_method_without_reply() {
    let network = network();
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<String>();
    let provider = provider(ProviderConfig::new(ADDRESS), None);
    provider.add_service(
        "Audit",
        None,
        ServiceBean::new().typed_method("record", &["String"], move |(event,): (String,)| {
            let _ = seen_tx.send(event);
            Ok(true)
        }),
    );
    provider.start(network.clone()).await.unwrap();

    let factory = invoker(None).await;
    let audit = reference(
        &factory,
        &network,
        ReferenceConfig::new("Audit")
            .with_address(ADDRESS)
            .with_call_type(CallType::Oneway),
    );

    let invocation = audit
        .invoke("record", &["String"], vec![json!("login")], CallOptions::default())
        .await
        .unwrap();
    assert!(invocation.is_dispatched());
    assert_eq!(factory.call_table().pending_count(), 0);

    let event = timeout(Duration::from_secs(2), seen_rx.recv()).await.unwrap();
    assert_eq!(event.as_deref(), Some("login"));

    // Give a stray reply time to arrive before checking none did
    tokio::time::sleep(Duration::from_millis(50)).await;
    let stats = factory.call_table().stats();
    assert_eq!(stats.total_discarded.load(Ordering::Relaxed), 0);
    assert_eq!(stats.total_registered.load(Ordering::Relaxed), 0);
}

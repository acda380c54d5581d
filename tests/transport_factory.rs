// tests/transport_factory.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::time::{timeout, Duration};

use mom_local::{
    // ---
    channel_handler,
    Address,
    AddressRegistry,
    BoxFuture,
    Channel,
    ChannelPtr,
    ChannelType,
    Client,
    ClientConstructor,
    ClientPtr,
    Error,
    Result,
    Server,
    ServerConfig,
    ServerConstructor,
    ServerPtr,
    TransportFactory,
    DEFAULT_LOCAL_ADDRESS,
};

fn echo_config() -> ServerConfig<Value> {
    // ---
    ServerConfig::new(channel_handler(|channel: ChannelPtr<Value>, _cancel| async move {
        while let Some(message) = channel.recv().await? {
            channel.send(message).await?;
        }
        Ok(())
    }))
}

/// Constructors for a scheme whose transport refuses everything, counting how
/// often each one is reached.
fn refusing_constructors(
    calls: Arc<AtomicUsize>,
) -> (ServerConstructor<Value>, ClientConstructor<Value>) {
    // ---
    let server_calls = calls.clone();
    let create_server: ServerConstructor<Value> = Arc::new(
        move |config: ServerConfig<Value>| -> BoxFuture<'static, Result<ServerPtr<Value>>> {
            server_calls.fetch_add(1, Ordering::SeqCst);
            let address = config.address_or("mock://0").to_string();
            Box::pin(async move { Err(Error::UnexpectedConfiguration(address)) })
        },
    );

    let connect: ClientConstructor<Value> = Arc::new(
        move |dest: Address, _local: Option<Address>| -> BoxFuture<'static, Result<ClientPtr<Value>>> {
            calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Err(Error::ConnectionRefused(dest.to_string())) })
        },
    );

    (create_server, connect)
}

#[tokio::test]
async fn local_factory_creates_and_connects() {
    // ---
    // Arrange
    // ---
    let registry = AddressRegistry::<Value>::new();
    let factory = TransportFactory::local(registry.clone());

    // ---
    // Act
    // ---
    let server = factory
        .create_server(echo_config().with_address("local://factory"))
        .await
        .expect("create failed");

    let client = factory
        .connect("local://factory", None)
        .await
        .expect("connect failed");

    client.send(json!({ "op": "ping" })).await.expect("send failed");
    let reply = timeout(Duration::from_secs(1), client.recv())
        .await
        .expect("timed out waiting for echo");

    // ---
    // Assert
    // ---
    assert_eq!(reply, Ok(Some(json!({ "op": "ping" }))));
    assert_eq!(server.channel_type(), ChannelType::Local);
    assert_eq!(client.channel().channel_type(), ChannelType::Local);
    assert!(registry.lookup(&Address::from("local://factory")).is_some());

    client.close().await.expect("close failed");
    server.stop().await.expect("stop failed");
}

#[tokio::test]
async fn server_without_address_gets_the_default() {
    // ---
    let registry = AddressRegistry::<Value>::new();
    let factory = TransportFactory::local(registry);

    let server = factory
        .create_server(echo_config())
        .await
        .expect("create failed");

    assert_eq!(server.address().as_str(), DEFAULT_LOCAL_ADDRESS);
}

#[tokio::test]
async fn configured_default_address_is_used() {
    // ---
    let registry = AddressRegistry::<Value>::new();
    let factory = TransportFactory::builder()
        .with_local(registry.clone())
        .default_address("local://home")
        .build()
        .expect("build failed");

    let server = factory
        .create_server(echo_config())
        .await
        .expect("create failed");

    assert_eq!(server.address().as_str(), "local://home");
    assert_eq!(registry.addresses(), vec![Address::from("local://home")]);
}

#[tokio::test]
async fn unknown_scheme_is_unsupported() {
    // ---
    let factory = TransportFactory::local(AddressRegistry::<Value>::new());

    let err = factory
        .connect("tcp://127.0.0.1:7000", None)
        .await
        .err()
        .expect("connect unexpectedly succeeded");
    assert_eq!(err, Error::UnsupportedScheme("tcp".into()));

    let err = factory
        .create_server(echo_config().with_address("ucx://node-2"))
        .await
        .err()
        .expect("create unexpectedly succeeded");
    assert_eq!(err, Error::UnsupportedScheme("ucx".into()));
}

#[tokio::test]
async fn address_without_scheme_is_invalid() {
    // ---
    let factory = TransportFactory::local(AddressRegistry::<Value>::new());

    let err = factory
        .connect("nowhere", None)
        .await
        .err()
        .expect("connect unexpectedly succeeded");

    assert_eq!(err, Error::InvalidAddress("nowhere".into()));
}

#[tokio::test]
async fn registered_schemes_dispatch_case_insensitively() {
    // ---
    // Arrange
    // ---
    let calls = Arc::new(AtomicUsize::new(0));
    let (create_server, connect) = refusing_constructors(calls.clone());

    let factory = TransportFactory::builder()
        .with_local(AddressRegistry::<Value>::new())
        .register("Mock", create_server, connect)
        .build()
        .expect("build failed");

    // ---
    // Act
    // ---
    let connect_err = factory
        .connect("MOCK://peer", None)
        .await
        .err()
        .expect("mock connect unexpectedly succeeded");
    let create_err = factory
        .create_server(echo_config().with_address("mock://srv"))
        .await
        .err()
        .expect("mock create unexpectedly succeeded");

    // ---
    // Assert
    // ---
    assert_eq!(factory.schemes(), vec!["local", "mock"]);
    assert!(factory.supports("MOCK"));
    assert_eq!(connect_err, Error::ConnectionRefused("MOCK://peer".into()));
    assert_eq!(create_err, Error::UnexpectedConfiguration("mock://srv".into()));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn build_requires_a_transport_for_the_default_address() {
    // ---
    let err = TransportFactory::<Value>::builder()
        .build()
        .err()
        .expect("build unexpectedly succeeded");
    assert_eq!(err, Error::UnsupportedScheme("local".into()));

    let err = TransportFactory::<Value>::builder()
        .with_local(AddressRegistry::new())
        .default_address("no-scheme")
        .build()
        .err()
        .expect("build unexpectedly succeeded");
    assert_eq!(err, Error::InvalidAddress("no-scheme".into()));
}

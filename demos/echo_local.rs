use mom_local::{
    channel_handler, AddressRegistry, Channel, ChannelPtr, Client, Result, Server, ServerConfig,
    TransportFactory,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Message {
    Add { a: i32, b: i32 },
    Sum(i32),
}

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let registry = AddressRegistry::<Message>::new();
    let factory = TransportFactory::local(registry);

    let adder = channel_handler(|channel: ChannelPtr<Message>, _cancel| async move {
        while let Some(message) = channel.recv().await? {
            if let Message::Add { a, b } = message {
                channel.send(Message::Sum(a + b)).await?;
            }
        }
        Ok(())
    });

    let server = factory
        .create_server(ServerConfig::new(adder).with_address("local://math"))
        .await?;

    let client = factory.connect("local://math", None).await?;

    client.send(Message::Add { a: 20, b: 3 }).await?;
    if let Some(Message::Sum(sum)) = client.recv().await? {
        println!("20 + 3 = {sum}");
    }

    client.close().await?;
    server.stop().await?;
    server.join(None).await;
    Ok(())
}

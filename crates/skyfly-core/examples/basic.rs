// List devices and their latest activity for the configured account.
//
// Reads credentials through skyfly-config (config.toml, SKYBELL_USERNAME,
// SKYBELL_PASSWORD). Run with `RUST_LOG=skyfly_core=debug` for request logs.

use tracing_subscriber::EnvFilter;

use skyfly_core::{DeviceUpdate, Skybell};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cfg = skyfly_config::load_config()?;
    let mut skybell = Skybell::new(skyfly_config::to_client_config(&cfg)?)?;

    for device in skybell.initialize().await? {
        device.update(DeviceUpdate::default()).await?;
        println!("{}", device.desc());
        match device.latest(None)? {
            Some(activity) => println!("  latest: {} at {}", activity.event, activity.created_at),
            None => println!("  no activity yet"),
        }
    }
    if let Some(name) = skybell.user_first_name() {
        println!("signed in as {name}");
    }

    skybell.close().await;
    Ok(())
}

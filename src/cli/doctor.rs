//! Configuration and connectivity checks

use std::sync::Arc;
use std::time::Duration;

use shopsync_channels::{ChannelRegistry, WebSocketTransport};

use crate::settings::AppConfig;

pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("🏥 Shopsync Doctor\n");

    println!("Server:     {}", config.server.base_url);
    println!("Hub:        {}", config.server.hub_url());
    println!(
        "Reconnect:  {:?}s, capped at {}s",
        config.channels.reconnect_delays_secs, config.channels.max_reconnect_delay_secs
    );
    println!();

    let transport = match WebSocketTransport::new(&config.server.hub_url(), config.channels.connect_timeout()) {
        Ok(transport) => transport,
        Err(e) => {
            println!("❌ Hub URL is invalid: {e}");
            std::process::exit(1);
        }
    };

    let registry = ChannelRegistry::init(&config.channels, Arc::new(transport));
    let mut all_ok = true;
    for channel in registry.iter() {
        print!("Checking {} channel... ", channel.topic());
        let attempt = tokio::time::timeout(
            config.channels.connect_timeout() + Duration::from_secs(1),
            channel.connect(),
        )
        .await;
        match attempt {
            Ok(Ok(())) => println!("✅ connected"),
            Ok(Err(e)) => {
                println!("❌ {e}");
                all_ok = false;
            }
            Err(_) => {
                println!("❌ timed out");
                all_ok = false;
            }
        }
    }
    registry.teardown().await;

    println!();
    if all_ok {
        println!("✅ All checks passed!");
    } else {
        println!("⚠️  Some checks failed. Is the hub running at {}?", config.server.hub_url());
        std::process::exit(1);
    }

    Ok(())
}

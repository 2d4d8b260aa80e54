use depthcast_gateway::{FeedHandle, MarketUpdate, WsTransport, load_config, load_default_config};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("depthcast_gateway=info".parse()?)
                .add_directive("depthcast=info".parse()?),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            tracing::info!("Loading config from {}", path);
            load_config(&path)?
        }
        None => load_default_config()?,
    };

    let handle = FeedHandle::start(config, WsTransport).await?;
    tracing::info!("Feed started for {}", handle.current_instrument());

    let mut updates = handle.subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down...");
                handle.shutdown();
                break;
            }
            update = updates.next() => {
                match update {
                    Some(update) => log_update(&update),
                    None => break,
                }
            }
        }
    }

    Ok(())
}

fn log_update(update: &MarketUpdate) {
    let book = &update.book;
    match (book.best_bid(), book.best_ask()) {
        (Some(bid), Some(ask)) => {
            tracing::info!(
                "{} [{}] bid {:.8} x {:.4} | ask {:.8} x {:.4} | spread {:.8} | imbalance {:+.3}",
                update.instrument,
                update.state,
                bid.price,
                bid.amount,
                ask.price,
                ask.amount,
                book.spread().unwrap_or(0.0),
                update.imbalance,
            );
        }
        _ => {
            tracing::info!("{} [{}] book empty", update.instrument, update.state);
        }
    }
}

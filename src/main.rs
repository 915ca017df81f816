use std::sync::Arc;

use tracing::{error, info, warn};

mod bridge;
mod channel;
mod config;
mod error;
mod extractor;
mod format;
mod handle;
mod normalize;
mod piped;
mod pool;
mod routes;
#[cfg(test)]
mod testing;
mod util;

pub use error::{Error, Result};
pub use util::W;

use crate::{bridge::Bridge, channel::MethodChannel, config::Settings};

#[tokio::main(flavor = "current_thread")]
async fn main() {
  tracing_subscriber::fmt::init();

  let settings = Settings::from_env();
  let bridge = Arc::new(Bridge::from_settings(&settings));

  // build the extractors in the background so the first request is fast
  let warm = bridge.clone();
  tokio::spawn(async move {
    if let Err(e) = warm.warm_up().await {
      warn!("warm up failed, will retry on first request: {e}");
    }
  });

  let app = routes::router(MethodChannel::new(bridge));

  info!("Listening on {}", settings.listen_addr);

  let server = axum::Server::bind(&settings.listen_addr)
    .serve(app.into_make_service())
    .with_graceful_shutdown(async {
      tokio::signal::ctrl_c().await.ok();
      info!("shutting down");
    });

  if let Err(e) = server.await {
    error!("server error: {e}");
    std::process::exit(1);
  }
}

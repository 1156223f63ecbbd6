//! sickbeetz entry point.

use std::process::ExitCode;
use std::time::Duration;

use sickbeetz_core::{TracingConfig, init_tracing};
use sickbeetz_providers::spotify::{SpotifyClient, SpotifyOAuth};
use sickbeetz_providers::{AuthorizationFlow, TokenStore};
use sickbeetz_server::{
    Checkpoint, NotifierConfig, Poller, ServerError, ServerResult, SignalHandler, SlackMessenger,
};
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = init_tracing(TracingConfig::from_env()) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> ServerResult<()> {
    let config = NotifierConfig::load()?;
    config.validate()?;

    let spotify = config.spotify_config()?;
    spotify.validate().map_err(ServerError::config)?;

    // Obtain a token before anything else; the loop never re-authorizes.
    let store = TokenStore::new(config.token_path());
    let exchange = SpotifyOAuth::new(&spotify).map_err(ServerError::Authorization)?;
    let flow = AuthorizationFlow::new(exchange, store, config.authorization_config());
    let token = flow.authorize().await.map_err(ServerError::Authorization)?;

    let music = SpotifyClient::new(&token, &spotify).map_err(ServerError::Remote)?;
    let messenger = SlackMessenger::new(
        config.slack_token()?,
        Duration::from_secs(SlackMessenger::DEFAULT_TIMEOUT_SECS),
    )?;
    let checkpoint = Checkpoint::new(config.checkpoint_path());

    let signals = SignalHandler::new();
    signals.spawn_listener();

    let poller_config = config.poller_config();
    info!(
        user = %poller_config.user,
        playlist = %poller_config.playlist_name,
        channel = %poller_config.channel,
        interval_secs = poller_config.interval.as_secs(),
        checkpoint = %checkpoint.path().display(),
        "sickbeetz starting"
    );

    Poller::new(music, messenger, checkpoint, poller_config)
        .run(signals.shutdown())
        .await
}

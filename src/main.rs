use env_logger;
use log::{error, info};
use spotify_playback_test::config;
use spotify_playback_test::controls::{ControlForm, SubmitEvent, TerminalPanel};
use spotify_playback_test::player::remote::{DeviceSelector, RemoteDevice, RemoteSdk};
use spotify_playback_test::player::sdk::PlaybackDevice;
use spotify_playback_test::player::{PlayerBridge, ReadySlot, SharedDevice};
use spotify_playback_test::spotify::auth::{Bootstrap, ImplicitGrant};
use spotify_playback_test::spotify::data::PlaybackApi;
use spotify_playback_test::spotify::AuthContext;
use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::oneshot;
use tokio::time::sleep;
use url::Url;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging
    env_logger::init();

    // Load configuration
    let config = config::load_config()?;
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    let auth = authenticate(&config, &mut stdin).await?;
    let api = PlaybackApi::new(config.spotify.api_url.clone());

    // Hand the player bridge to the SDK, which calls it once it has loaded
    let slot = ReadySlot::new();
    let sdk = Arc::new(RemoteSdk::new(
        api.clone(),
        DeviceSelector::from_config(config.player.device.clone()),
        config.player.poll_interval(),
    ));
    let device: SharedDevice<RemoteDevice> = Arc::new(Mutex::new(None));
    let (ready_tx, mut ready_rx) = oneshot::channel();

    let bridge = PlayerBridge::new(auth.clone(), config.player.name.clone());
    let bridge_sdk = sdk.clone();
    let holder = device.clone();
    slot.install(move || {
        let player = bridge.on_sdk_ready(bridge_sdk.as_ref(), move |device_id| {
            let _ = ready_tx.send(device_id);
        });
        *holder.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(player);
    });
    sdk.load(&slot);

    println!("Waiting for a Spotify Connect device...");
    let device_id = loop {
        tokio::select! {
            device_id = &mut ready_rx => break device_id?,
            _ = sleep(Duration::from_secs(1)) => {
                if !is_connected(&device) {
                    return Err("player stopped before a device became ready".into());
                }
            }
        }
    };

    let panel = TerminalPanel::new();
    let form = ControlForm::activate(device_id, auth, api, &panel);

    let mut pending = Vec::new();
    while let Some(line) = stdin.next_line().await? {
        let mut event = SubmitEvent::new(line);
        pending.extend(form.submit(&mut event));
    }

    for submission in pending {
        if let Err(err) = submission.await {
            error!("play request task failed: {}", err);
        }
    }

    if let Some(mut player) = device.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take() {
        player.disconnect();
    }
    Ok(())
}

/// Runs the implicit grant: send the user to Spotify, then read back the URL they landed on.
async fn authenticate(
    config: &config::Config,
    stdin: &mut Lines<BufReader<Stdin>>,
) -> Result<AuthContext, Box<dyn Error>> {
    let grant = ImplicitGrant::new(config.spotify.client_id.clone())?;
    let page = Url::parse(&config.spotify.redirect_uri)?;

    let state = match grant.bootstrap(&page, None)? {
        Bootstrap::Authorized(auth) => return Ok(auth),
        Bootstrap::Redirect { url, state } => {
            println!("Open this URL in your browser:\n{}", url);
            state
        }
    };

    println!("Enter the URL you were redirected to:");
    let landed = match stdin.next_line().await? {
        Some(line) => Url::parse(line.trim())?,
        None => return Err("no redirect URL entered".into()),
    };

    match grant.bootstrap(&landed, Some(&state))? {
        Bootstrap::Authorized(auth) => {
            info!("Authorized against {}", config.spotify.api_url);
            Ok(auth)
        }
        Bootstrap::Redirect { .. } => Err("the redirect URL has no token fragment".into()),
    }
}

fn is_connected(device: &SharedDevice<RemoteDevice>) -> bool {
    device
        .lock()
        .map(|player| player.as_ref().map_or(false, RemoteDevice::is_connected))
        .unwrap_or(false)
}

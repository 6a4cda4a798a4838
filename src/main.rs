use clap::Parser;
use log::{error, info};
use tokio::signal;
use tokio::sync::mpsc;
use update_notifier::config::{Config, UpdateSource};
use update_notifier::hass::events::EventListener;
use update_notifier::hass::notify::{validated_targets, Dispatcher};
use update_notifier::hass::HaClient;
use update_notifier::notifier::Notifier;
use update_notifier::source;
use update_notifier::source::supervisor::SupervisorPoller;
use update_notifier::update::Origin;

#[derive(Parser, Debug)]
#[command(name = "update-notifier", about = "Home Assistant update notifier")]
struct Args {
    /// Run a single poll-render cycle and exit (no websocket, no timer).
    #[arg(long)]
    once: bool,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    init_logger();
    let args = Args::parse();
    info!("Starting Update Notifier");

    let mut config = Config::from_env();
    info!("Configuration loaded:");
    info!("  Update source: {:?}", config.update_source);
    info!("  Poll interval: {}s", config.poll.interval_secs);
    info!("  Poll origins: {:?}", config.poll.origins);
    info!("  Notification id: {}", config.notify.notification_id);
    info!("  Mobile targets: {:?}", config.notify.mobile_targets);

    let client = match HaClient::new(&config.hass, config.http_timeout()) {
        Ok(client) => client,
        Err(e) => {
            error!("Home Assistant client setup failed: {}", e);
            std::process::exit(1);
        }
    };

    // Unknown notify targets are dropped here, not at dispatch time.
    config.notify.mobile_targets =
        validated_targets(&client, &config.notify.mobile_targets).await;

    let dispatcher = Dispatcher::new(client.clone(), config.notify.clone());
    let notifier = Notifier::new(dispatcher);

    let poller = if config.update_source == UpdateSource::RestApi {
        match SupervisorPoller::new(&config.poll) {
            Ok(poller) if !poller.sections().is_empty() => Some(poller),
            Ok(_) => None,
            Err(e) => {
                error!("Supervisor poller setup failed: {}", e);
                None
            }
        }
    } else {
        None
    };

    if args.once {
        run_once(notifier, poller, &client, &config).await;
        return;
    }

    let (set_tx, set_rx) = mpsc::channel(32);
    let (event_tx, event_rx) = mpsc::channel(64);

    let notifier_task = tokio::spawn(notifier.run(set_rx));

    let router_task = tokio::spawn(source::route_state_changes(
        config.clone(),
        event_rx,
        set_tx.clone(),
    ));

    let watch_events = config.watch_hacs() || config.update_source == UpdateSource::UpdateEntities;
    let listener_task = if watch_events {
        source::prime_from_states(&client, &event_tx).await;
        let listener = EventListener::new(client.websocket_url(), client.token());
        Some(tokio::spawn(listener.run(event_tx)))
    } else {
        drop(event_tx);
        None
    };

    let poll_task = poller.map(|poller| {
        let interval = config.poll_interval();
        let tx = set_tx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let set = poller.poll().await;
                if tx.send((Origin::Supervisor, set)).await.is_err() {
                    return;
                }
            }
        })
    });
    drop(set_tx);

    info!("Update Notifier is running, press Ctrl+C to exit");
    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    // In-flight requests are abandoned with the tasks.
    if let Some(task) = poll_task {
        task.abort();
    }
    if let Some(task) = listener_task {
        task.abort();
    }
    router_task.abort();
    notifier_task.abort();

    info!("Update Notifier stopped");
}

/// One poll-render cycle for cron-style use: poll the Supervisor, read
/// the reactive origins once, publish, exit.
async fn run_once(
    mut notifier: Notifier<HaClient>,
    poller: Option<SupervisorPoller>,
    client: &HaClient,
    config: &Config,
) {
    if let Some(poller) = poller {
        let set = poller.poll().await;
        notifier.apply(Origin::Supervisor, set).await;
    }

    let (event_tx, event_rx) = mpsc::channel(64);
    let (set_tx, mut set_rx) = mpsc::channel(32);
    tokio::spawn(source::route_state_changes(config.clone(), event_rx, set_tx));

    let client = client.clone();
    tokio::spawn(async move {
        source::prime_from_states(&client, &event_tx).await;
    });

    // The channel closes once priming and routing are done.
    while let Some((origin, set)) = set_rx.recv().await {
        notifier.apply(origin, set).await;
    }
    info!("Single cycle complete");
}

#![forbid(unsafe_code)]

use clap::Parser;
use config::Config;
use discovery::{DiscoveryResult, ModuleDiscoveryWalker};
use flume::bounded;
use irkd::{
    cli::Cli,
    signals::{SignalEvent, wait_for_signal},
};
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // NOTE: The verbosity flag takes precedence over the environment variable
    // for log control. `IRK_LOG` can only set the level per crate, eg.
    // `IRK_LOG=discovery=trace irkd -v` traces the trust checks while
    // everything else logs at the info level.
    let env_filter = EnvFilter::builder()
        .with_env_var("IRK_LOG")
        .from_env()?
        .add_directive(cli.verbosity.log_level_filter().as_str().parse()?);

    let layer = tracing_subscriber::fmt::layer()
        .with_level(true)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(layer)
        .with(env_filter)
        .init();

    let config = load_config(&cli)?;
    debug!(?config, ?cli);

    // fail closed: nothing loads until the whole tree is trusted
    let mut accepted = discover(&config).await?;
    report(&accepted);
    if cli.once {
        return Ok(());
    }

    let (signals_tx, signals_rx) = bounded(8);
    let mut signal_handle = tokio::spawn(async move { wait_for_signal(signals_tx).await });

    loop {
        tokio::select! {
            // bubble up any errors from the signal handlers
            res = &mut signal_handle => {
                let res = res?;
                if let Err(err) = &res {
                    error!("error happened during handling signals: {}", err);
                }
                res?;
                info!("shutting down");
                return Ok(());
            }

            event_res = signals_rx.recv_async() => {
                let event = event_res?;
                debug!(?event, "Received signal event");

                match event {
                    SignalEvent::Reload => {
                        let config = match load_config(&cli) {
                            Ok(config) => config,
                            Err(err) => {
                                error!(%err, "failed to reload config, keeping previous modules");
                                continue;
                            }
                        };
                        match discover(&config).await {
                            Ok(result) => {
                                let diff = result.diff(&accepted);
                                for module in &diff.added {
                                    info!(path = ?module.path, "module added");
                                }
                                for module in &diff.modified {
                                    info!(path = ?module.path, "module changed");
                                }
                                for module in &diff.removed {
                                    info!(path = ?module.path, "module removed");
                                }
                                info!(changed = !diff.is_empty(), "config reloaded");
                                accepted = result;
                            }
                            Err(_) => warn!(
                                modules = accepted.len(),
                                "reload refused, keeping previously accepted modules"
                            ),
                        }
                    }
                    SignalEvent::DumpModules => report(&accepted),
                    SignalEvent::Shutdown => {
                        info!("shutting down");
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.conffile {
        Some(path) => Config::load(path)?,
        _ => {
            let mut candidates = glob::glob("/etc/irk/config.d/*.toml")?
                .filter_map(Result::ok)
                .collect::<Vec<_>>();
            candidates.insert(0, "/etc/irk/config.toml".into());
            trace!(?candidates, "config file candidates");
            Config::load_multiple(candidates)?
        }
    };
    if let Some(dir) = &cli.module_dir {
        config.discovery.module_dir = dir.clone();
    }
    Ok(config)
}

/// Run discovery off the async runtime. Violations are logged here, with the
/// offending path and every reason, before being returned.
async fn discover(config: &Config) -> anyhow::Result<DiscoveryResult> {
    let discovery = config.discovery.clone();
    let result = tokio::task::spawn_blocking(move || {
        ModuleDiscoveryWalker::new(&discovery).discover(&discovery.module_dir)
    })
    .await?;

    result.map_err(|err| {
        error!(
            path = ?err.path(),
            verdict = %err.verdict(),
            %err,
            "refusing to load modules"
        );
        err.into()
    })
}

fn report(result: &DiscoveryResult) {
    info!(modules = result.len(), "modules accepted");
    for module in result {
        info!(path = ?module.path, inode = module.identity.inode, "accepted module");
    }
}

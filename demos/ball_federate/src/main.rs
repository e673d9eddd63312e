//! Ball Federate Example
//!
//! Joins a federation on an in-process loopback bus, registers a set of
//! balls and pushes their positions every tick. An optional observer
//! federate joins the same federation and counts what it receives.

mod ball;

use anyhow::{Context, Result};
use ball::{ball_class, BallRule, BALL_CLASS};
use clap::Parser;
use federa_core::{
    EntityClassDefinition, FederateSession, RuntimeGateway, SessionConfig, SharedEntity,
};
use federa_loopback::{LoopbackBus, LoopbackGateway, ObjectModel};
use federa_script::Loader;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

#[derive(Parser)]
#[command(name = "ball_federate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Session configuration (RON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Class catalog (RON); defaults to the built-in BallEntity class
    #[arg(long)]
    classes: Option<PathBuf>,

    /// Federation execution name
    #[arg(long)]
    federation: Option<String>,

    /// Federate name
    #[arg(long)]
    federate: Option<String>,

    /// Object model document location
    #[arg(long)]
    fom: Option<String>,

    /// Number of balls to spawn
    #[arg(long, default_value_t = 10)]
    entities: i64,

    /// Milliseconds between ticks
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Stop after this many ticks (runs forever if omitted)
    #[arg(long)]
    ticks: Option<u64>,

    /// Join a second, observing federate to the same federation
    #[arg(long)]
    observe: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = session_config(&cli)?;
    let definitions = class_definitions(&cli)?;

    let bus = LoopbackBus::new();
    bus.install_model(&config.fom_location, ObjectModel::from_definitions(&definitions));

    let mut session = FederateSession::new(config.clone(), LoopbackGateway::new(bus.clone()))?;
    for definition in definitions {
        session.add_class(definition)?;
    }
    session
        .initialize()
        .with_context(|| format!("federate {:?} failed to start", config.federate_name))?;

    let mut observer = if cli.observe {
        Some(start_observer(&bus, &config, class_definitions(&cli)?)?)
    } else {
        None
    };

    if session.class(BALL_CLASS).is_none() {
        warn!(class = BALL_CLASS, "class not declared, no balls spawned");
    } else {
        let added = spawn_balls(&mut session, cli.entities)?;
        if added < cli.entities {
            warn!(added, requested = cli.entities, "some balls could not be added");
        }
    }
    info!(entities = session.entity_count(), "entities registered");

    let interval = session.config().tick_interval();
    loop {
        let report = session.tick()?;
        for failure in &report.failures {
            warn!(entity = %failure.entity, error = %failure.error, "entity skipped this tick");
        }
        for entity in session.entities() {
            trace_attributes(&entity);
        }

        if let Some(observer) = observer.as_mut() {
            let wait = observer.config().callback_wait;
            observer.gateway_mut().pump_callbacks(wait.min(), wait.max());
        }

        if cli.ticks.is_some_and(|limit| report.tick >= limit) {
            break;
        }
        std::thread::sleep(interval);
    }

    if let Some(observer) = &observer {
        let callbacks = observer.callbacks();
        info!(
            discovered = callbacks.discovered(),
            reflected = callbacks.reflected(),
            "observer summary"
        );
    }
    info!(ticks = session.tick_count(), "simulation finished");
    Ok(())
}

/// Spawn `count` balls and add each to the federation
///
/// A ball that fails to register or push is logged and skipped. Returns how
/// many were added cleanly.
fn spawn_balls<G: RuntimeGateway>(session: &mut FederateSession<G>, count: i64) -> Result<i64> {
    let mut added = 0;
    for i in 0..count {
        let ball = session.spawn(BALL_CLASS, BallRule::nth(i))?;
        match session.add_entity(&ball) {
            Ok(_) => added += 1,
            Err(e) => error!(entity = %ball.id(), error = %e, "could not add ball"),
        }
    }
    Ok(added)
}

fn session_config(cli: &Cli) -> Result<SessionConfig> {
    let mut config = match &cli.config {
        Some(path) => federa_script::load_config(path)
            .with_context(|| format!("could not load {}", path.display()))?,
        None => SessionConfig::new("Main Sim Federation", "Main Sim Federate", "MainSim.xml")
            .with_federate_type("BallFederate"),
    };

    if let Some(federation) = &cli.federation {
        config.federation_name = federation.clone();
    }
    if let Some(federate) = &cli.federate {
        config.federate_name = federate.clone();
    }
    if let Some(fom) = &cli.fom {
        config.fom_location = fom.clone();
    }
    if let Some(interval_ms) = cli.interval_ms {
        config.tick_interval_ms = interval_ms;
    }
    config.validate()?;
    Ok(config)
}

fn class_definitions(cli: &Cli) -> Result<Vec<EntityClassDefinition>> {
    let Some(path) = &cli.classes else {
        return Ok(vec![ball_class()]);
    };
    let mut loader = Loader::new();
    loader
        .load_file(path)
        .with_context(|| format!("could not load {}", path.display()))?;
    Ok(loader.definitions())
}

fn start_observer(
    bus: &LoopbackBus,
    config: &SessionConfig,
    definitions: Vec<EntityClassDefinition>,
) -> Result<FederateSession<LoopbackGateway>> {
    let config = config
        .clone()
        .join_only()
        .with_federate_type("Observer");
    let config = SessionConfig {
        federate_name: format!("{} Observer", config.federate_name),
        ..config
    };

    let mut observer = FederateSession::new(config, LoopbackGateway::new(bus.clone()))?;
    for definition in definitions {
        observer.add_class(definition)?;
    }
    if let Err(e) = observer.initialize() {
        error!(error = %e, "observer failed to join");
        return Err(e.into());
    }
    Ok(observer)
}

fn trace_attributes(entity: &SharedEntity) {
    let instance = entity.read();
    let attributes = instance.attributes();
    for name in instance.class().attribute_names() {
        let bytes = attributes.encoded(name).unwrap_or_default();
        debug!(
            entity = %instance.id(),
            attribute = name,
            encoded = %String::from_utf8_lossy(bytes),
            "attribute"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use federa_core::{CallbackWait, Error};

    fn session(gateway: impl FnOnce(LoopbackBus) -> LoopbackGateway) -> FederateSession<LoopbackGateway> {
        let bus = LoopbackBus::new();
        bus.install_model("MainSim.xml", ObjectModel::from_definitions([&ball_class()]));
        let config = SessionConfig::new("Main Sim Federation", "Main Sim Federate", "MainSim.xml")
            .with_callback_wait(CallbackWait::immediate());

        let mut session = FederateSession::new(config, gateway(bus)).unwrap();
        session.add_class(ball_class()).unwrap();
        session.initialize().unwrap();
        session
    }

    #[test]
    fn test_spawn_balls() {
        let mut session = session(LoopbackGateway::new);
        assert_eq!(spawn_balls(&mut session, 10).unwrap(), 10);
        assert_eq!(session.entity_count(), 10);
    }

    #[test]
    fn test_refused_registration_skips_ball_and_continues() {
        let mut session = session(|bus| LoopbackGateway::new(bus).failing_register());
        assert_eq!(spawn_balls(&mut session, 10).unwrap(), 0);
        assert_eq!(session.gateway().stats().registrations, 10);
        assert_eq!(session.entity_count(), 0);
    }

    #[test]
    fn test_flat_ball_rejected_by_rule() {
        let mut session = session(LoopbackGateway::new);
        let flat = session
            .spawn(BALL_CLASS, BallRule { r: 0, ..BallRule::nth(1) })
            .unwrap();
        assert!(matches!(session.add_entity(&flat), Err(Error::Update(_))));

        let report = session.tick().unwrap();
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0].error, Error::Update(_)));
    }
}

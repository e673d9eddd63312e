//! Federate session: lifecycle state machine and attribute synchronization
//!
//! A session walks a fixed sequence of phases:
//!
//! ```text
//! Disconnected ─connect─▶ Connected ─create─▶ FederationCreated ─join─▶ Joined ─initialize_classes─▶ Ready
//!                              └──────────────────join───────────────────▲
//! ```
//!
//! There is no way back. A failed step leaves the session in the phase it
//! was in, and a session that never reaches `Ready` must not be ticked.
//!
//! Once `Ready`, the owner registers instances with [`FederateSession::add_entity`]
//! and calls [`FederateSession::tick`] on its own schedule. Tick failures are
//! isolated per entity and reported in the [`TickReport`].

use crate::callbacks::SessionCallbacks;
use crate::class_def::EntityClassDefinition;
use crate::config::{CallbackWait, SessionConfig};
use crate::entity::{EntityInstance, SharedEntity, UpdateRule};
use crate::error::{Error, Result};
use crate::gateway::{CallbackSink, Connection, GatewayError, RuntimeGateway};
use crate::identity::{AttributeHandleValueMap, EntityId, FederateHandle, InstanceHandle};
use crate::registry::ClassRegistry;
use crate::tag::UpdateTag;
use crate::view::{EntityTable, SessionView};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Lifecycle phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// No bus connection
    Disconnected,
    /// Connected to the bus
    Connected,
    /// Federation execution created (optional step)
    FederationCreated,
    /// Member of the federation execution
    Joined,
    /// Classes resolved and published; ticking is allowed
    Ready,
}

impl Phase {
    /// Get the phase name
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Disconnected => "Disconnected",
            Phase::Connected => "Connected",
            Phase::FederationCreated => "FederationCreated",
            Phase::Joined => "Joined",
            Phase::Ready => "Ready",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of [`FederateSession::add_entity`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The instance was registered and its initial snapshot pushed
    Registered(InstanceHandle),
    /// The instance already had a handle; nothing was done
    AlreadyRegistered(InstanceHandle),
}

impl Registration {
    /// The instance's bus handle
    pub fn instance_handle(&self) -> InstanceHandle {
        match self {
            Registration::Registered(handle) | Registration::AlreadyRegistered(handle) => *handle,
        }
    }

    /// Check if this call performed the registration
    pub fn is_new(&self) -> bool {
        matches!(self, Registration::Registered(_))
    }
}

/// An entity that could not be stepped or pushed during a tick
#[derive(Debug)]
pub struct TickFailure {
    pub entity: EntityId,
    pub error: Error,
}

/// Result of one tick
#[derive(Debug)]
pub struct TickReport {
    /// Tick number, starting at 1
    pub tick: u64,
    /// Entities whose attributes were pushed, in visit order
    pub pushed: Vec<EntityId>,
    /// Entities that failed, in visit order
    pub failures: Vec<TickFailure>,
}

impl TickReport {
    fn new(tick: u64) -> Self {
        Self {
            tick,
            pushed: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Number of entities visited
    pub fn visited(&self) -> usize {
        self.pushed.len() + self.failures.len()
    }

    /// Check if every entity was pushed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One federate's membership in a federation execution
pub struct FederateSession<G> {
    config: SessionConfig,
    gateway: G,
    phase: Phase,
    connection: Option<Connection>,
    federate_handle: Option<FederateHandle>,
    registry: ClassRegistry,
    entities: EntityTable,
    callbacks: Arc<SessionCallbacks>,
    sequence: u64,
    ticks: u64,
}

impl<G: RuntimeGateway> FederateSession<G> {
    /// Create a disconnected session
    pub fn new(config: SessionConfig, gateway: G) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            gateway,
            phase: Phase::Disconnected,
            connection: None,
            federate_handle: None,
            registry: ClassRegistry::new(),
            entities: Arc::new(RwLock::new(IndexMap::new())),
            callbacks: Arc::new(SessionCallbacks::new()),
            sequence: 0,
            ticks: 0,
        })
    }

    /// Declare a class this federate will publish
    ///
    /// Classes must be declared before `initialize_classes`.
    pub fn add_class(&mut self, definition: EntityClassDefinition) -> Result<Arc<EntityClassDefinition>> {
        if self.phase == Phase::Ready {
            return Err(self.wrong_phase("add_class", "before Ready"));
        }
        self.registry.register(definition)
    }

    /// Run every initialization step: connect, create (if configured), join, initialize classes
    pub fn initialize(&mut self) -> Result<()> {
        let result = self.run_initialization();
        match &result {
            Ok(()) => info!(
                federation = %self.config.federation_name,
                federate = %self.config.federate_name,
                "federate initialized"
            ),
            Err(e) => error!(phase = %self.phase, error = %e, "federate initialization failed"),
        }
        result
    }

    fn run_initialization(&mut self) -> Result<()> {
        self.connect()?;
        if self.config.create_federation {
            let fom_location = self.config.fom_location.clone();
            self.create_federation_execution(&fom_location)?;
        }
        self.join_federation_execution()?;
        self.initialize_classes()
    }

    /// Connect to the bus and hand it our callback sink
    pub fn connect(&mut self) -> Result<()> {
        self.require("connect", "Disconnected", &[Phase::Disconnected])?;

        let sink: Arc<dyn CallbackSink> = self.callbacks.clone();
        let connection = self.gateway.connect(sink).map_err(Error::Connection)?;
        info!(endpoint = %connection.endpoint, "connected to bus");

        self.connection = Some(connection);
        self.phase = Phase::Connected;
        Ok(())
    }

    /// Create the federation execution from an object model document
    ///
    /// "Already exists" is fatal unless `tolerate_existing_federation` is set.
    pub fn create_federation_execution(&mut self, fom_location: &str) -> Result<()> {
        self.require("create_federation_execution", "Connected", &[Phase::Connected])?;
        if fom_location.trim().is_empty() {
            return Err(Error::invalid_config("fom_location must not be empty"));
        }

        let federation = self.config.federation_name.clone();
        match self.gateway.create_federation_execution(&federation, fom_location) {
            Ok(()) => info!(%federation, fom = fom_location, "created federation execution"),
            Err(GatewayError::AlreadyExists(_)) if self.config.tolerate_existing_federation => {
                warn!(%federation, "federation execution already exists, joining it");
            }
            Err(source) => return Err(Error::Creation { federation, source }),
        }

        self.phase = Phase::FederationCreated;
        Ok(())
    }

    /// Join the federation execution, retrying per the join policy
    pub fn join_federation_execution(&mut self) -> Result<FederateHandle> {
        self.require(
            "join_federation_execution",
            "Connected or FederationCreated",
            &[Phase::Connected, Phase::FederationCreated],
        )?;

        let policy = self.config.join;
        let mut last = GatewayError::NotJoined;
        for attempt in 1..=policy.max_attempts {
            let joined = self.gateway.join_federation_execution(
                &self.config.federate_name,
                &self.config.federate_type,
                &self.config.federation_name,
            );
            match joined {
                Ok(handle) => {
                    self.federate_handle = Some(handle);
                    self.phase = Phase::Joined;
                    pump(&mut self.gateway, self.config.callback_wait);
                    info!(%handle, attempt, federation = %self.config.federation_name, "joined federation execution");
                    return Ok(handle);
                }
                Err(e) => {
                    warn!(attempt, max_attempts = policy.max_attempts, error = %e, "join attempt failed");
                    last = e;
                    if attempt < policy.max_attempts {
                        let delay = policy.backoff.delay_after(attempt);
                        if !delay.is_zero() {
                            std::thread::sleep(delay);
                        }
                    }
                }
            }
        }

        Err(Error::JoinTimeout {
            federation: self.config.federation_name.clone(),
            attempts: policy.max_attempts,
            last,
        })
    }

    /// Resolve and publish every declared class
    ///
    /// Stops at the first class that fails. Classes resolved before it keep
    /// their handles, but the session does not become `Ready`.
    pub fn initialize_classes(&mut self) -> Result<()> {
        self.require("initialize_classes", "Joined", &[Phase::Joined])?;

        let wait = self.config.callback_wait;
        for definition in self.registry.iter() {
            let class = definition.name();
            let failed = |source: Error| Error::ClassInitialization {
                class: class.to_string(),
                source: Box::new(source),
            };

            let resolved = self.registry.resolve(class, &mut self.gateway).map_err(failed)?;
            pump(&mut self.gateway, wait);

            let handles = resolved.handle_set();
            self.gateway
                .publish_attributes(resolved.class_handle(), &handles)
                .map_err(|source| {
                    failed(Error::Publish {
                        class: class.to_string(),
                        source,
                    })
                })?;
            pump(&mut self.gateway, wait);

            info!(class, handle = %resolved.class_handle(), attributes = handles.len(), "class initialized");
        }

        self.phase = Phase::Ready;
        info!(classes = self.registry.len(), "all classes initialized");
        Ok(())
    }

    /// Create an unregistered instance of a declared, resolved class
    pub fn spawn(&self, class: &str, rule: impl UpdateRule + 'static) -> Result<SharedEntity> {
        let definition = self
            .registry
            .get(class)
            .ok_or_else(|| Error::UnknownClass(class.to_string()))?;
        Ok(SharedEntity::new(EntityInstance::new(Arc::clone(definition), rule)?))
    }

    /// Register an instance with the bus and push its initial snapshot
    ///
    /// Adding an instance that already has a handle logs a warning and
    /// returns [`Registration::AlreadyRegistered`]. If registration succeeds
    /// but the initial push fails, the instance stays registered and tracked
    /// and the push error is returned.
    pub fn add_entity(&mut self, entity: &SharedEntity) -> Result<Registration> {
        self.require("add_entity", "Ready", &[Phase::Ready])?;

        let id = entity.id();
        let mut instance = entity.write();
        if let Some(handle) = instance.instance_handle() {
            warn!(entity = %id, %handle, "entity already registered, skipping");
            return Ok(Registration::AlreadyRegistered(handle));
        }

        let class = instance.class_name().to_string();
        let declared = self
            .registry
            .get(&class)
            .is_some_and(|definition| Arc::ptr_eq(definition, instance.class()));
        if !declared {
            return Err(Error::UnknownClass(class));
        }
        let class_handle = instance
            .class()
            .class_handle()
            .ok_or_else(|| Error::ClassNotResolved(class.clone()))?;

        let handle = self
            .gateway
            .register_instance(class_handle)
            .map_err(|source| {
                error!(entity = %id, %class, error = %source, "registration failed");
                Error::Registration {
                    entity: id,
                    class: class.clone(),
                    source,
                }
            })?;
        instance.assign_instance_handle(handle);
        self.entities.write().insert(id, entity.clone());
        pump(&mut self.gateway, self.config.callback_wait);
        info!(entity = %id, %class, %handle, "registered entity");

        instance.refresh_attributes()?;
        let values = instance.snapshot_for_transmission();
        drop(instance);

        self.transmit(id, &class, handle, &values)?;
        Ok(Registration::Registered(handle))
    }

    /// Push an instance's current attributes to the bus
    pub fn push_attributes(&mut self, entity: &SharedEntity) -> Result<()> {
        self.require("push_attributes", "Ready", &[Phase::Ready])?;
        let (handle, class, values) = prepare_push(entity, false)?;
        self.transmit(entity.id(), &class, handle, &values)
    }

    /// Step every registered instance once and push its attributes
    ///
    /// A failing instance is recorded in the report and the remaining
    /// instances are still processed.
    pub fn tick(&mut self) -> Result<TickReport> {
        self.require("tick", "Ready", &[Phase::Ready])?;

        self.ticks += 1;
        let mut report = TickReport::new(self.ticks);
        let entities: Vec<SharedEntity> = self.entities.read().values().cloned().collect();

        for entity in &entities {
            let id = entity.id();
            let pushed = prepare_push(entity, true)
                .and_then(|(handle, class, values)| self.transmit(id, &class, handle, &values));
            match pushed {
                Ok(()) => report.pushed.push(id),
                Err(e) => {
                    error!(entity = %id, tick = report.tick, error = %e, "entity update failed");
                    report.failures.push(TickFailure { entity: id, error: e });
                }
            }
        }

        debug!(tick = report.tick, pushed = report.pushed.len(), failed = report.failures.len(), "tick complete");
        Ok(report)
    }

    fn transmit(
        &mut self,
        entity: EntityId,
        class: &str,
        handle: InstanceHandle,
        values: &AttributeHandleValueMap,
    ) -> Result<()> {
        self.sequence += 1;
        let tag = UpdateTag::now(class, self.sequence);
        self.gateway
            .update_attribute_values(handle, values, &tag.to_bytes())
            .map_err(|source| Error::Transmission {
                entity,
                class: class.to_string(),
                source,
            })?;
        debug!(%entity, class, sequence = tag.sequence, "pushed attributes");
        Ok(())
    }

    fn require(&self, operation: &'static str, expected: &'static str, allowed: &[Phase]) -> Result<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(self.wrong_phase(operation, expected))
        }
    }

    fn wrong_phase(&self, operation: &'static str, expected: &'static str) -> Error {
        Error::InvalidPhase {
            operation,
            expected,
            actual: self.phase,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Current lifecycle phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Check if the session may tick
    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Ready
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Bus connection, once connected
    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    /// Federate handle, once joined
    pub fn federate_handle(&self) -> Option<FederateHandle> {
        self.federate_handle
    }

    /// Declared classes
    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// Look up a declared class
    pub fn class(&self, name: &str) -> Option<&Arc<EntityClassDefinition>> {
        self.registry.get(name)
    }

    /// Registered instance by id
    pub fn entity(&self, id: EntityId) -> Option<SharedEntity> {
        self.entities.read().get(&id).cloned()
    }

    /// Registered instances in registration order
    pub fn entities(&self) -> Vec<SharedEntity> {
        self.entities.read().values().cloned().collect()
    }

    /// Number of registered instances
    pub fn entity_count(&self) -> usize {
        self.entities.read().len()
    }

    /// Number of ticks run so far
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Read-only view for observers on other threads
    pub fn view(&self) -> SessionView {
        SessionView::new(Arc::clone(&self.entities))
    }

    /// Callback sink registered with the bus
    pub fn callbacks(&self) -> &Arc<SessionCallbacks> {
        &self.callbacks
    }

    /// Get the gateway
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Get the gateway mutably
    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }
}

impl<G> fmt::Debug for FederateSession<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FederateSession")
            .field("federation", &self.config.federation_name)
            .field("federate", &self.config.federate_name)
            .field("phase", &self.phase)
            .field("federate_handle", &self.federate_handle)
            .field("classes", &self.registry.len())
            .field("entities", &self.entities.read().len())
            .finish()
    }
}

fn pump<G: RuntimeGateway + ?Sized>(gateway: &mut G, wait: CallbackWait) {
    gateway.pump_callbacks(wait.min(), wait.max());
}

// Optionally steps the instance, then copies out what a push needs so the
// instance lock is not held across the gateway call.
fn prepare_push(entity: &SharedEntity, step: bool) -> Result<(InstanceHandle, String, AttributeHandleValueMap)> {
    let mut instance = entity.write();
    if step {
        instance.step()?;
    }
    let class = instance.class_name().to_string();
    let handle = instance.instance_handle().ok_or_else(|| Error::NotRegistered {
        entity: entity.id(),
        class: class.clone(),
    })?;
    Ok((handle, class, instance.snapshot_for_transmission()))
}

//! The game: owner of every registry, entity and context.

use d20_state::{DiceGenerator, EntityId, RuntimeConfig, UnavailableDice};
use generational_arena::{Arena, Index};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, info, warn};

use crate::context::{Context, ContextKey, ContextKind, ContextTree};
use crate::entity::Entity;
use crate::event::{EventRegistry, EventToken, Handler, HandlerReturn};
use crate::rpc::Server;
use crate::Result;

/// A unit of rules content. Modules receive their own context, below the
/// root, and install handlers, entities and further modules from it.
pub trait Module: 'static {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn on_create(&self, ctx: &Context) -> Result<()>;
}

struct GameInner {
    config: RuntimeConfig,
    dice: Rc<dyn DiceGenerator>,
    root_handlers: EventRegistry,
    entities: RefCell<Vec<Entity>>,
    transients: RefCell<Arena<Entity>>,
    modules: RefCell<Vec<Rc<dyn Module>>>,
    contexts: RefCell<ContextTree>,
    root: ContextKey,
}

/// Shared handle to a game. Cloning is cheap and every clone refers to the
/// same game.
#[derive(Clone)]
pub struct Game {
    inner: Rc<GameInner>,
}

impl Game {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_dice(config, UnavailableDice)
    }

    /// Build a game with a dice generator installed.
    pub fn with_dice<D: DiceGenerator + 'static>(config: RuntimeConfig, dice: D) -> Self {
        let (contexts, root) = ContextTree::with_root();
        Self {
            inner: Rc::new(GameInner {
                config,
                dice: Rc::new(dice),
                root_handlers: EventRegistry::new(),
                entities: RefCell::new(Vec::new()),
                transients: RefCell::new(Arena::new()),
                modules: RefCell::new(Vec::new()),
                contexts: RefCell::new(contexts),
                root,
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn dice_generator(&self) -> Rc<dyn DiceGenerator> {
        Rc::clone(&self.inner.dice)
    }

    pub fn root_context(&self) -> Context {
        Context::from_key(self.clone(), self.inner.root)
    }

    pub fn ptr_eq(&self, other: &Game) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn contexts(&self) -> &RefCell<ContextTree> {
        &self.inner.contexts
    }

    /// Number of live contexts, the root included.
    pub fn context_count(&self) -> usize {
        self.inner.contexts.borrow().len()
    }

    /// Create an entity that lives as long as the game.
    pub fn create_entity(&self) -> Entity {
        let entity = Entity::new(None);
        self.inner.entities.borrow_mut().push(entity.clone());
        debug!(entity = %entity.id(), "entity created");
        entity
    }

    /// Create a transient entity owned by the root context. It lives until
    /// [`Game::release_transient`] is called for it.
    pub fn create_transient_entity(&self) -> Result<Entity> {
        self.create_transient_entity_in(self.inner.root)
    }

    pub(crate) fn create_transient_entity_in(&self, owner: ContextKey) -> Result<Entity> {
        let mut contexts = self.inner.contexts.borrow_mut();
        let node = contexts.get_mut(owner)?;

        let mut transients = self.inner.transients.borrow_mut();
        let slot = transients.insert_with(|slot| Entity::new(Some(slot)));
        node.transients.push(slot);

        let entity = transients[slot].clone();
        debug!(entity = %entity.id(), context = %owner, "transient entity created");
        Ok(entity)
    }

    /// Whether `entity` is a live transient entity of this game.
    pub fn is_transient(&self, entity: &Entity) -> bool {
        match entity.transient_slot() {
            Some(slot) => self
                .inner
                .transients
                .borrow()
                .get(slot)
                .is_some_and(|live| live.ptr_eq(entity)),
            None => false,
        }
    }

    /// Release a transient entity ahead of its owning context. Returns
    /// whether anything was released.
    pub fn release_transient(&self, entity: &Entity) -> bool {
        if !self.is_transient(entity) {
            return false;
        }

        let released = entity
            .transient_slot()
            .and_then(|slot| self.inner.transients.borrow_mut().remove(slot));
        released.is_some()
    }

    pub(crate) fn release_transient_slots(&self, slots: Vec<Index>) {
        let released: Vec<Entity> = {
            let mut transients = self.inner.transients.borrow_mut();
            slots.into_iter().filter_map(|slot| transients.remove(slot)).collect()
        };

        if !released.is_empty() {
            debug!(count = released.len(), "transient entities released");
        }
    }

    pub fn transient_count(&self) -> usize {
        self.inner.transients.borrow().len()
    }

    /// Persistent entities, in creation order.
    pub fn entities(&self) -> Vec<Entity> {
        self.inner.entities.borrow().clone()
    }

    /// Find a persistent or live transient entity by id.
    pub fn entity(&self, id: EntityId) -> Option<Entity> {
        let persistent = self.inner.entities.borrow().iter().find(|e| e.id() == id).cloned();
        persistent.or_else(|| {
            self.inner
                .transients
                .borrow()
                .iter()
                .map(|(_, entity)| entity)
                .find(|e| e.id() == id)
                .cloned()
        })
    }

    /// Give `module` its own context below the root and run its setup.
    ///
    /// A module whose setup fails is not kept, and its context is disposed.
    pub fn register_module<M: Module>(&self, module: M) -> Result<()> {
        let name = module.name().to_string();
        let ctx = self
            .root_context()
            .spawn_child(ContextKind::Module(name.clone()))?;

        if let Err(err) = module.on_create(&ctx) {
            warn!(module = %name, error = %err, "module setup failed");
            ctx.dispose()?;
            return Err(err);
        }

        self.inner.modules.borrow_mut().push(Rc::new(module));
        info!(module = %name, context = %ctx.key(), "module registered");
        Ok(())
    }

    pub fn module_count(&self) -> usize {
        self.inner.modules.borrow().len()
    }

    pub fn module_names(&self) -> Vec<String> {
        self.inner
            .modules
            .borrow()
            .iter()
            .map(|module| module.name().to_string())
            .collect()
    }

    /// Register a handler on the root registry, consulted by
    /// [`Context::call_root_event`].
    pub fn register_handler<A, R, F>(&self, token: EventToken<A, R>, callback: F) -> Result<()>
    where
        A: 'static,
        R: 'static,
        F: Fn(&Context, &A) -> Result<HandlerReturn<R>> + 'static,
    {
        self.inner.root_handlers.register_handler(token, callback)
    }

    pub fn handlers<A: 'static, R: 'static>(&self, token: EventToken<A, R>) -> Result<Vec<Handler<A, R>>> {
        self.inner.root_handlers.handlers(token)
    }

    pub fn root_handlers(&self) -> &EventRegistry {
        &self.inner.root_handlers
    }

    /// Run `work` in a throwaway child of the root context, disposed when
    /// `work` returns.
    pub fn context_call<T>(&self, work: impl FnOnce(&Context) -> Result<T>) -> Result<T> {
        let scope = self.root_context().create_child_context()?;
        work(&scope)
    }

    /// Create a command server rooted at `root_entity`.
    pub fn create_rpc_server(&self, root_entity: &Entity) -> Result<Server> {
        let ctx = self.root_context().spawn_child(ContextKind::Server)?;
        info!(entity = %root_entity.id(), context = %ctx.key(), "rpc server created");
        Ok(Server::new(ctx, root_entity.clone()))
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Game")
            .field("entities", &self.inner.entities.borrow().len())
            .field("transients", &self.transient_count())
            .field("modules", &self.module_names())
            .field("contexts", &self.context_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RuntimeError;
    use d20_state::{DiceResults, DiceSpecification, StateError};
    use serde_json::json;

    const SCORE: EventToken<i64, i64> = EventToken::new("test.score");

    struct Scoring {
        bonus: i64,
    }

    impl Module for Scoring {
        fn name(&self) -> &str {
            "scoring"
        }

        fn on_create(&self, ctx: &Context) -> Result<()> {
            let bonus = self.bonus;
            ctx.register_root_handler(SCORE, move |_, base| Ok(HandlerReturn::Value(base + bonus)))
        }
    }

    struct Broken;

    impl Module for Broken {
        fn on_create(&self, _ctx: &Context) -> Result<()> {
            Err(RuntimeError::PermissionDenied("broken".into()))
        }
    }

    struct Nesting;

    impl Module for Nesting {
        fn name(&self) -> &str {
            "nesting"
        }

        fn on_create(&self, ctx: &Context) -> Result<()> {
            ctx.register_module(Scoring { bonus: 1 })
        }
    }

    #[test]
    fn test_register_module() {
        let game = Game::new();
        game.register_module(Scoring { bonus: 5 }).unwrap();

        assert_eq!(game.module_names(), vec!["scoring"]);
        let children = game.root_context().children().unwrap();
        assert_eq!(children.len(), 1);
        assert!(matches!(children[0].kind().unwrap(), ContextKind::Module(name) if name == "scoring"));

        let result = game
            .context_call(|ctx| ctx.call_root_event(SCORE, 10)?.invoke())
            .unwrap();
        assert_eq!(result, Some(15));
    }

    #[test]
    fn test_failed_module_is_not_kept() {
        let game = Game::new();
        let err = game.register_module(Broken).unwrap_err();

        assert!(matches!(err, RuntimeError::PermissionDenied(_)));
        assert_eq!(game.module_count(), 0);
        assert_eq!(game.context_count(), 1);
    }

    #[test]
    fn test_nested_modules() {
        let game = Game::new();
        game.register_module(Nesting).unwrap();
        assert_eq!(game.module_names(), vec!["scoring", "nesting"]);
    }

    #[test]
    fn test_transient_entities() {
        let game = Game::new();
        let root = game.root_context();
        let persistent = root.create_entity();

        let released = {
            let scope = root.create_child_context().unwrap();
            let transient = scope.create_transient_entity().unwrap();
            assert!(game.is_transient(&transient));
            assert_eq!(game.entity(transient.id()), Some(transient.clone()));
            transient
        };

        assert!(!game.is_transient(&released));
        assert!(!game.is_transient(&persistent));
        assert_eq!(game.transient_count(), 0);
        assert_eq!(game.entity(persistent.id()), Some(persistent));
    }

    #[test]
    fn test_release_transient_early() {
        let game = Game::new();
        let entity = game.create_transient_entity().unwrap();

        assert_eq!(game.transient_count(), 1);
        assert!(game.release_transient(&entity));
        assert!(!game.release_transient(&entity));
        assert_eq!(game.transient_count(), 0);
    }

    struct FixedDice(i64);

    impl DiceGenerator for FixedDice {
        fn execute(&self, spec: &DiceSpecification) -> Result<DiceResults, StateError> {
            Ok(DiceResults {
                rolled: spec.0.clone(),
                value: self.0,
            })
        }

        fn reroll_all(&self, results: &DiceResults) -> Result<DiceResults, StateError> {
            Ok(results.clone())
        }
    }

    #[test]
    fn test_dice_generator() {
        let game = Game::new();
        let spec = DiceSpecification::new(json!("1d20"));
        assert!(game.dice_generator().execute(&spec).is_err());

        let game = Game::with_dice(RuntimeConfig::default(), FixedDice(17));
        let ctx = game.root_context();
        assert_eq!(ctx.dice_generator().execute(&spec).unwrap().value, 17);
    }
}

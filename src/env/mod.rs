//! Deployment-target adapters and the guest lifecycle.
//!
//! Two host flavors exist side by side: [`Flavor::World`] exposes the
//! broad simulation surface and [`Flavor::Arena`] a reduced one with
//! several functions stubbed to no-ops. Both speak the identical wire
//! protocol; only the registered tables differ, which is the seam a new
//! host integration plugs into.
//!
//! The lifecycle is strict: instantiate ([`Environment::new`]), then
//! [`Environment::init`] once, then [`Environment::tick`] repeatedly.
//! Nothing here holds a memory view across guest calls, so growth during
//! a step needs no extra handling beyond taking fresh views afterwards.

pub mod arena;
pub mod world;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::bail;

use crate::codec::GuestMalloc;
use crate::context::InteropContext;
use crate::host::HostObject;
use crate::memory::GuestMemory;

/// Host-side state shared between an adapter's registered functions and
/// the environment driving the lifecycle.
#[derive(Clone, Default)]
pub struct HostHooks {
    /// Current tick, advanced once per [`Environment::tick`].
    pub time: Rc<Cell<u64>>,
    /// Simulated CPU spent this tick; the full flavor reports it through
    /// `game.cpu.getUsed`.
    pub cpu_used: Rc<Cell<f64>>,
    /// Lines captured from the guest's `game.log` and `game.notify`.
    pub log_lines: Rc<RefCell<Vec<String>>>,
    /// Persistent object exposed as `game.memory.get` in the full flavor.
    pub memory_object: HostObject,
}

impl HostHooks {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Which host flavor to populate the registry with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    World,
    Arena,
}

/// The guest's lifecycle exports as seen by the environment.
///
/// A real embedding implements this over the engine's exported entry
/// points; tests implement it directly in Rust. The guest binds its
/// imports in `init` and drives bound call sites from `tick`.
pub trait Guest {
    fn init(&mut self, ctx: &mut InteropContext) -> Result<(), String>;
    fn tick(&mut self, ctx: &mut InteropContext) -> Result<(), String>;
}

/// Owns one guest instance's context and enforces lifecycle order.
pub struct Environment {
    ctx: InteropContext,
    hooks: HostHooks,
    guest: Box<dyn Guest>,
    initialized: bool,
}

impl Environment {
    /// Instantiate: build the context over the guest's memory and
    /// allocator, and populate the import registry for `flavor`.
    pub fn new(
        flavor: Flavor,
        memory: GuestMemory,
        malloc: GuestMalloc,
        guest: Box<dyn Guest>,
    ) -> Self {
        let mut ctx = InteropContext::new(memory, malloc);
        let hooks = HostHooks::new();
        match flavor {
            Flavor::World => world::register(&mut ctx, &hooks),
            Flavor::Arena => arena::register(&mut ctx, &hooks),
        }
        Environment {
            ctx,
            hooks,
            guest,
            initialized: false,
        }
    }

    pub fn hooks(&self) -> &HostHooks {
        &self.hooks
    }

    pub fn ctx_mut(&mut self) -> &mut InteropContext {
        &mut self.ctx
    }

    /// Run the guest's one-time init. Must precede the first tick.
    pub fn init(&mut self) -> anyhow::Result<()> {
        if self.initialized {
            bail!("guest already initialized");
        }
        self.guest
            .init(&mut self.ctx)
            .map_err(|e| anyhow::anyhow!("guest init failed: {e}"))?;
        self.initialized = true;
        Ok(())
    }

    /// Advance host time and run one guest tick.
    pub fn tick(&mut self) -> anyhow::Result<()> {
        if !self.initialized {
            bail!("tick before init");
        }
        self.hooks.time.set(self.hooks.time.get() + 1);
        self.hooks.cpu_used.set(0.0);
        self.guest
            .tick(&mut self.ctx)
            .map_err(|e| anyhow::anyhow!("guest tick failed: {e}"))?;
        Ok(())
    }
}

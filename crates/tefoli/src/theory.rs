//! Theory handle
//!
//! A [`Theory`] owns the extension's opaque state together with everything
//! needed to reach it: the bound functions, the library they live in and the
//! host error channel. The state is created once in the constructor and
//! destroyed once, either explicitly through [`Theory::destroy`] or on drop.
//!
//! # Call order
//!
//! The bridge does no locking and relies on the host's call order:
//! 1. `configure` (any number of times)
//! 2. `register_options` / `validate_options` when running as an application
//! 3. `register`, then `rewrite_statement` for each parsed statement
//! 4. `prepare` between grounding and solving
//! 5. `on_model` / `on_statistics` from the solve events; the assignment
//!    accessors are only meaningful inside `on_model`

use crate::assignment::{Assignment, AssignmentIndices};
use crate::channel::{ErrorChannel, HostErrorChannel};
use crate::error::{TheoryError, TheoryResult};
use crate::ffi::binder::{Binder, BoundFn, ErrorPolicy, LibrarySource, SymbolSource};
use crate::ffi::callbacks::RewriteContext;
use crate::ffi::loader::{LibraryResolver, LoadError};
use crate::ffi::safety::to_c_string;
use crate::ffi::types::*;
use crate::host::{ApplicationOptions, Control, Model, Statement, StatisticsMap};
use crate::value::{Symbol, Value};
use std::fmt::{self, Display};
use std::ptr;
use tefoli_config::loader::DEFAULT_HOST_LIBRARY;
use tefoli_config::Config;

/// The functions a theory library exports
struct TheoryApi {
    create: BoundFn<CreateFn>,
    destroy: BoundFn<DestroyFn>,
    register: BoundFn<RegisterFn>,
    rewrite_statement: Option<BoundFn<RewriteStatementFn>>,
    prepare: BoundFn<PrepareFn>,
    register_options: BoundFn<RegisterOptionsFn>,
    validate_options: BoundFn<ValidateOptionsFn>,
    on_model: BoundFn<OnModelFn>,
    on_statistics: BoundFn<OnStatisticsFn>,
    lookup_symbol: BoundFn<LookupSymbolFn>,
    get_symbol: BoundFn<GetSymbolFn>,
    assignment_begin: BoundFn<AssignmentBeginFn>,
    assignment_next: BoundFn<AssignmentNextFn>,
    assignment_has_value: BoundFn<AssignmentHasValueFn>,
    assignment_get_value: BoundFn<AssignmentGetValueFn>,
    configure: BoundFn<ConfigureFn>,
}

impl TheoryApi {
    /// Bind every function; only `rewrite_statement` may be missing
    unsafe fn bind(source: &dyn SymbolSource, prefix: &str) -> Result<Self, LoadError> {
        use ErrorPolicy::{PassThrough, Strict};

        let binder = Binder::new(source, prefix);
        let rewrite_statement = binder.optional("rewrite_statement", Strict);
        if rewrite_statement.is_none() {
            tracing::warn!(
                library = source.name(),
                symbol = %binder.symbol_name("rewrite_statement"),
                "library does not export rewrite_statement; statement rewriting is disabled"
            );
        }

        Ok(Self {
            create: binder.require("create", Strict)?,
            destroy: binder.require("destroy", Strict)?,
            register: binder.require("register", Strict)?,
            rewrite_statement,
            prepare: binder.require("prepare", Strict)?,
            register_options: binder.require("register_options", Strict)?,
            validate_options: binder.require("validate_options", Strict)?,
            on_model: binder.require("on_model", Strict)?,
            on_statistics: binder.require("on_statistics", Strict)?,
            lookup_symbol: binder.require("lookup_symbol", PassThrough)?,
            get_symbol: binder.require("get_symbol", PassThrough)?,
            assignment_begin: binder.require("assignment_begin", PassThrough)?,
            assignment_next: binder.require("assignment_next", PassThrough)?,
            assignment_has_value: binder.require("assignment_has_value", PassThrough)?,
            assignment_get_value: binder.require("assignment_get_value", PassThrough)?,
            configure: binder.require("configure", Strict)?,
        })
    }
}

/// A theory extension loaded from a shared library
pub struct Theory {
    /// Extension state; `None` once destroyed
    state: Option<RawTheory>,
    api: TheoryApi,
    channel: Box<dyn ErrorChannel>,
    prefix: String,
    registered: bool,
    // Keeps the bound functions mapped
    source: Box<dyn SymbolSource + Send>,
}

// Safety: the extension state is only reached through `&mut self` for mutating
// calls; read-only calls follow the host's serialization contract.
unsafe impl Send for Theory {}

impl Theory {
    /// Load `library` and bind the functions named `<prefix>_<operation>`
    ///
    /// Uses the platform search list and the default host library for errors.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tefoli::Theory;
    ///
    /// let mut theory = Theory::load("lpx", "clingolpx")?;
    /// theory.configure("strict", "true")?;
    /// # Ok::<(), tefoli::TheoryError>(())
    /// ```
    pub fn load(prefix: &str, library: &str) -> TheoryResult<Self> {
        Self::load_with(&LibraryResolver::new(), prefix, library, DEFAULT_HOST_LIBRARY)
    }

    /// Load with an explicit resolver and host library
    ///
    /// Loading runs the library's initialization code; only load libraries you
    /// trust to implement the theory interface.
    pub fn load_with(
        resolver: &LibraryResolver,
        prefix: &str,
        library: &str,
        host_library: &str,
    ) -> TheoryResult<Self> {
        let source = LibrarySource::new(library, resolver.load(library)?);
        // SAFETY: `source` ends up in the theory, which drops its channel first.
        let channel = unsafe { HostErrorChannel::locate(&source, resolver, host_library)? };
        // SAFETY: the source is a library implementing the theory interface.
        unsafe { Self::from_parts(prefix, Box::new(source), Box::new(channel)) }
    }

    /// Load the theory described by a configuration and apply its options
    pub fn from_config(config: &Config) -> TheoryResult<Self> {
        let resolver: LibraryResolver = config.search_paths().into_iter().collect();
        let mut theory = Self::load_with(
            &resolver,
            config.prefix()?,
            config.library_name()?,
            config.host_library(),
        )?;
        theory.apply_options(config)?;
        Ok(theory)
    }

    /// Pass every configured option to `configure`, in key order
    ///
    /// Stops at the first option the extension rejects.
    pub fn apply_options(&mut self, config: &Config) -> TheoryResult<()> {
        for (key, value) in config.options() {
            tracing::debug!(%key, %value, "applying theory option");
            self.configure(&key, &value)?;
        }
        Ok(())
    }

    /// Build a theory from any symbol source
    ///
    /// # Safety
    ///
    /// Every `<prefix>_<operation>` address in `source` must point to a function
    /// with the signature declared in [`crate::ffi::types`], valid for as long as
    /// `source` lives.
    pub unsafe fn from_source<S, C>(prefix: &str, source: S, channel: C) -> TheoryResult<Self>
    where
        S: SymbolSource + Send + 'static,
        C: ErrorChannel + 'static,
    {
        Self::from_parts(prefix, Box::new(source), Box::new(channel))
    }

    unsafe fn from_parts(
        prefix: &str,
        source: Box<dyn SymbolSource + Send>,
        channel: Box<dyn ErrorChannel>,
    ) -> TheoryResult<Self> {
        let api = TheoryApi::bind(&*source, prefix)?;
        let mut theory = Self {
            state: None,
            api,
            channel,
            prefix: prefix.to_string(),
            registered: false,
            source,
        };
        theory.create()?;
        Ok(theory)
    }

    fn create(&mut self) -> TheoryResult<()> {
        let mut raw: RawTheory = ptr::null_mut();
        // SAFETY: `create` writes the new state through the out pointer.
        let ok = unsafe { (self.api.create.get())(&mut raw) };
        self.api.create.check(ok, &*self.channel)?;
        self.state = Some(raw);
        tracing::debug!(library = self.source.name(), prefix = %self.prefix, "theory created");
        Ok(())
    }

    fn state(&self) -> TheoryResult<RawTheory> {
        self.state.ok_or(TheoryError::Destroyed)
    }

    fn check<F: Copy>(&self, f: BoundFn<F>, ok: bool) -> TheoryResult<bool> {
        f.check(ok, &*self.channel)
    }

    /// Release the extension state
    ///
    /// Idempotent: only the first call reaches the library. Later operations
    /// fail with [`TheoryError::Destroyed`].
    pub fn destroy(&mut self) -> TheoryResult<()> {
        let Some(state) = self.state.take() else {
            return Ok(());
        };
        // SAFETY: `state` came from `create` and is released exactly once.
        let ok = unsafe { (self.api.destroy.get())(state) };
        tracing::debug!(library = self.source.name(), "theory destroyed");
        self.check(self.api.destroy, ok).map(|_| ())
    }

    /// Whether [`Theory::destroy`] already ran
    pub fn is_destroyed(&self) -> bool {
        self.state.is_none()
    }

    /// Set a key/value option, similar to a command line option
    ///
    /// Must be called before [`Theory::register`]; the library decides what a
    /// later call means.
    pub fn configure(&mut self, key: &str, value: &str) -> TheoryResult<()> {
        let state = self.state()?;
        if self.registered {
            tracing::warn!(key, "configure called after register");
        }
        let c_key = to_c_string("option key", key)?;
        let c_value = to_c_string("option value", value)?;
        // SAFETY: both strings outlive the call.
        let ok = unsafe { (self.api.configure.get())(state, c_key.as_ptr(), c_value.as_ptr()) };
        self.check(self.api.configure, ok).map(|_| ())
    }

    /// Register the theory with a control object
    pub fn register(&mut self, control: Control) -> TheoryResult<()> {
        let state = self.state()?;
        // SAFETY: the host guarantees `control` is alive for the call.
        let ok = unsafe { (self.api.register.get())(state, control.as_ptr()) };
        self.check(self.api.register, ok)?;
        self.registered = true;
        Ok(())
    }

    /// Whether the library exports `rewrite_statement`
    pub fn can_rewrite(&self) -> bool {
        self.api.rewrite_statement.is_some()
    }

    /// Rewrite a statement, passing every produced statement to `add`
    ///
    /// `add` is only reachable by the library during this call. If it returns
    /// an error, the library is told the callback failed and is expected to
    /// abort; the library's own error is then returned. A panic in `add` is
    /// resumed once the library call has returned.
    pub fn rewrite_statement<F, E>(&mut self, stm: Statement, mut add: F) -> TheoryResult<()>
    where
        F: FnMut(Statement) -> Result<(), E>,
        E: Display,
    {
        let rewrite = self
            .api
            .rewrite_statement
            .ok_or(TheoryError::RewriteUnavailable)?;
        let state = self.state()?;

        let mut ctx = RewriteContext::new(&mut add);
        let callback = ctx.callback();
        // SAFETY: `ctx` lives on this frame until the library returns and the
        // callback type matches the context's closure type.
        let ok = unsafe { (rewrite.get())(state, stm.as_ptr(), callback, ctx.as_data()) };
        ctx.resume_panic();

        if let Some(failure) = ctx.failure() {
            tracing::warn!(failure, reported = ctx.failures(), "rewrite callback failed");
        }
        self.check(rewrite, ok)?;

        // The library swallowed a callback failure; do not report success.
        match ctx.failure() {
            Some(failure) => Err(TheoryError::Runtime(failure.to_string())),
            None => Ok(()),
        }
    }

    /// Prepare the theory; call between grounding and solving
    pub fn prepare(&mut self, control: Control) -> TheoryResult<()> {
        let state = self.state()?;
        // SAFETY: the host guarantees `control` is alive for the call.
        let ok = unsafe { (self.api.prepare.get())(state, control.as_ptr()) };
        self.check(self.api.prepare, ok).map(|_| ())
    }

    /// Declare the theory's options on an application options object
    pub fn register_options(&mut self, options: ApplicationOptions) -> TheoryResult<()> {
        let state = self.state()?;
        // SAFETY: the host guarantees `options` is alive for the call.
        let ok = unsafe { (self.api.register_options.get())(state, options.as_ptr()) };
        self.check(self.api.register_options, ok).map(|_| ())
    }

    /// Validate the options after parsing
    pub fn validate_options(&mut self) -> TheoryResult<()> {
        let state = self.state()?;
        // SAFETY: plain call on the live state.
        let ok = unsafe { (self.api.validate_options.get())(state) };
        self.check(self.api.validate_options, ok).map(|_| ())
    }

    /// Inform the theory that a model has been found
    ///
    /// An error here should abort solving in the host's model handler.
    pub fn on_model(&mut self, model: Model) -> TheoryResult<()> {
        let state = self.state()?;
        // SAFETY: the host guarantees `model` is alive for the call.
        let ok = unsafe { (self.api.on_model.get())(state, model.as_ptr()) };
        self.check(self.api.on_model, ok).map(|_| ())
    }

    /// Add the theory's statistics to the step and accumulated maps
    pub fn on_statistics(&mut self, step: StatisticsMap, accu: StatisticsMap) -> TheoryResult<()> {
        let state = self.state()?;
        // SAFETY: the host guarantees both maps are alive for the call.
        let ok = unsafe { (self.api.on_statistics.get())(state, step.as_ptr(), accu.as_ptr()) };
        self.check(self.api.on_statistics, ok).map(|_| ())
    }

    /// Index of a symbol assigned by the theory, `None` if it has none
    pub fn lookup_symbol(&self, symbol: Symbol) -> TheoryResult<Option<usize>> {
        let state = self.state()?;
        let mut index = 0usize;
        // SAFETY: `index` is a valid out pointer for the call.
        let found = unsafe { (self.api.lookup_symbol.get())(state, symbol.to_raw(), &mut index) };
        tracing::trace!(symbol = symbol.to_raw(), found, index, "lookup_symbol");
        Ok(self.check(self.api.lookup_symbol, found)?.then_some(index))
    }

    /// Symbol associated with an index
    ///
    /// The index must come from [`Theory::lookup_symbol`] or an assignment
    /// traversal; the library alone decides what other values do.
    pub fn get_symbol(&self, index: usize) -> TheoryResult<Symbol> {
        let state = self.state()?;
        // SAFETY: see the index contract above.
        let raw = unsafe { (self.api.get_symbol.get())(state, index) };
        Ok(Symbol::from_raw(raw))
    }

    /// Start an assignment traversal; returns the initial cursor
    pub fn assignment_begin(&self, thread_id: u32) -> TheoryResult<usize> {
        let state = self.state()?;
        let mut cursor = 0usize;
        // SAFETY: `cursor` is a valid out pointer for the call.
        unsafe { (self.api.assignment_begin.get())(state, thread_id, &mut cursor) };
        tracing::trace!(thread_id, cursor, "assignment_begin");
        Ok(cursor)
    }

    /// Advance a traversal; `false` ends it
    pub fn assignment_next(&self, thread_id: u32, cursor: &mut usize) -> TheoryResult<bool> {
        let state = self.state()?;
        // SAFETY: `cursor` is a valid in/out pointer for the call.
        let more = unsafe { (self.api.assignment_next.get())(state, thread_id, cursor) };
        tracing::trace!(thread_id, cursor = *cursor, more, "assignment_next");
        self.check(self.api.assignment_next, more)
    }

    /// Whether the index has a value in the current model
    pub fn has_value(&self, thread_id: u32, index: usize) -> TheoryResult<bool> {
        let state = self.state()?;
        // SAFETY: plain call on the live state.
        let assigned = unsafe { (self.api.assignment_has_value.get())(state, thread_id, index) };
        self.check(self.api.assignment_has_value, assigned)
    }

    /// Value of the index in the current model
    ///
    /// Check [`Theory::has_value`] first; an unknown discriminant is reported as
    /// [`TheoryError::InvalidValueKind`].
    pub fn get_value(&self, thread_id: u32, index: usize) -> TheoryResult<Value> {
        let state = self.state()?;
        let mut raw = RawValue::default();
        // SAFETY: `raw` is a valid out pointer with the C layout.
        unsafe { (self.api.assignment_get_value.get())(state, thread_id, index, &mut raw) };
        Value::decode(&raw).map_err(|e| {
            tracing::error!(thread_id, index, ?raw, "theory returned an invalid value");
            e
        })
    }

    /// Value of a symbol in the current model, if it has one
    pub fn lookup_value(&self, thread_id: u32, symbol: Symbol) -> TheoryResult<Option<Value>> {
        match self.lookup_symbol(symbol)? {
            Some(index) if self.has_value(thread_id, index)? => {
                self.get_value(thread_id, index).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// All symbol/value pairs of the current model found by `thread_id`
    ///
    /// Indices without a value are skipped. Starting a new traversal restarts
    /// from the first entry.
    pub fn assignment(&self, thread_id: u32) -> TheoryResult<Assignment<'_>> {
        Assignment::begin(self, thread_id)
    }

    /// Raw indices of the current assignment of `thread_id`
    pub fn assignment_indices(&self, thread_id: u32) -> TheoryResult<AssignmentIndices<'_>> {
        AssignmentIndices::begin(self, thread_id)
    }

    /// Prefix of the bound functions
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Name of the library the functions come from
    pub fn library(&self) -> &str {
        self.source.name()
    }
}

impl Drop for Theory {
    fn drop(&mut self) {
        if let Err(error) = self.destroy() {
            tracing::warn!(%error, "failed to destroy theory");
        }
    }
}

impl fmt::Debug for Theory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Theory")
            .field("library", &self.source.name())
            .field("prefix", &self.prefix)
            .field("destroyed", &self.is_destroyed())
            .field("registered", &self.registered)
            .field("can_rewrite", &self.can_rewrite())
            .finish()
    }
}

//! Partial-page output caching around a wrapped piece of content.
//!
//! Lifecycle per request: [`init`](PartialCachingControl::init) decides hit
//! or miss, [`load`](PartialCachingControl::load) and
//! [`pre_render`](PartialCachingControl::pre_render) pass through, and
//! [`render`](PartialCachingControl::render) either replays the cached
//! fragment or renders, stores and emits a fresh one.

use crate::dependency::{AggregateDependency, DependencyFactory};
use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::key::{self, VaryByCustomResolver, VaryInputs};
use crate::registrar::{ClientRegistrar, RecordingRegistrar, Registrations};
use crate::request::RequestValues;
use crate::store::{CachedItem, Clock, Expiration, FragmentStore, InsertRequest, SystemClock};
use crate::vary::ControlCachedVary;
use core_types::WriterKind;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tools::HashCombiner;

/// Output caching settings for one cached control.
#[derive(Clone, Default)]
pub struct CachePolicy {
    /// Zero disables caching.
    pub duration: Duration,
    /// Expire after `duration` without access instead of at a fixed time.
    pub sliding: bool,
    pub vary_by_params: Option<Vec<String>>,
    pub vary_by_controls: Option<Vec<String>>,
    pub vary_by_custom: Option<String>,
    /// Invoked once per insert; see [`DependencyFactory`].
    pub dependency: Option<DependencyFactory>,
    pub sql_dependency: Option<DependencyFactory>,
    pub provider: Option<String>,
    pub enabled: bool,
}

impl CachePolicy {
    pub fn for_duration(duration: Duration) -> Self {
        Self {
            duration,
            enabled: true,
            ..Self::default()
        }
    }

    pub fn is_active(&self) -> bool {
        self.enabled && !self.duration.is_zero()
    }

    /// The vary descriptor this policy stores under, or `None` when no
    /// dimension is configured.
    pub fn vary(&self) -> Option<ControlCachedVary> {
        let non_empty = |list: &Option<Vec<String>>| list.clone().filter(|items| !items.is_empty());
        let params = non_empty(&self.vary_by_params);
        let controls = non_empty(&self.vary_by_controls);
        let custom = self.vary_by_custom.clone().filter(|custom| !custom.is_empty());
        if params.is_none() && controls.is_none() && custom.is_none() {
            return None;
        }
        Some(ControlCachedVary::new(params, controls, custom))
    }
}

impl fmt::Debug for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachePolicy")
            .field("duration", &self.duration)
            .field("sliding", &self.sliding)
            .field("vary_by_params", &self.vary_by_params)
            .field("vary_by_controls", &self.vary_by_controls)
            .field("vary_by_custom", &self.vary_by_custom)
            .field("dependency", &self.dependency.is_some())
            .field("sql_dependency", &self.sql_dependency.is_some())
            .field("provider", &self.provider)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// The content a [`PartialCachingControl`] wraps.
pub trait CachedContent {
    fn init(&mut self, _registrar: &mut dyn ClientRegistrar) {}

    fn load(&mut self) {}

    fn pre_render(&mut self, _registrar: &mut dyn ClientRegistrar) {}

    fn render(
        &mut self,
        out: &mut String,
        registrar: &mut dyn ClientRegistrar,
    ) -> Result<(), CacheError>;
}

pub type ContentFactory = Box<dyn Fn() -> Box<dyn CachedContent>>;

/// Per-request inputs to key derivation.
#[derive(Clone, Copy)]
pub struct FragmentRequest<'a> {
    pub values: &'a RequestValues,
    pub writer: WriterKind,
    /// Unique id of the enclosing naming container; `None` at page level.
    pub naming_container: Option<&'a str>,
    pub resolver: Option<&'a dyn VaryByCustomResolver>,
}

impl<'a> FragmentRequest<'a> {
    pub fn new(values: &'a RequestValues) -> Self {
        Self {
            values,
            writer: WriterKind::default(),
            naming_container: None,
            resolver: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FragmentState {
    Uninitialized,
    Hit,
    MissRendering,
    MissCached,
    Disabled,
}

pub struct PartialCachingControl {
    control_id: String,
    identity: String,
    policy: CachePolicy,
    store: Arc<dyn FragmentStore>,
    clock: Arc<dyn Clock>,
    factory: ContentFactory,
    state: FragmentState,
    base_key: String,
    real_key: String,
    found_vary: Option<Arc<ControlCachedVary>>,
    entry: Option<Arc<CacheEntry>>,
    child: Option<Box<dyn CachedContent>>,
    recorded: Registrations,
}

impl PartialCachingControl {
    /// `identity` is the stable token of the cached declaration (shared by
    /// every instance of it); `control_id` is this instance's id.
    pub fn new(
        control_id: impl Into<String>,
        identity: impl Into<String>,
        policy: CachePolicy,
        store: Arc<dyn FragmentStore>,
        factory: ContentFactory,
    ) -> Self {
        Self {
            control_id: control_id.into(),
            identity: identity.into(),
            policy,
            store,
            clock: Arc::new(SystemClock),
            factory,
            state: FragmentState::Uninitialized,
            base_key: String::new(),
            real_key: String::new(),
            found_vary: None,
            entry: None,
            child: None,
            recorded: Registrations::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> FragmentState {
        self.state
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Key of the realized entry; empty before a miss is resolved.
    pub fn cache_key(&self) -> &str {
        &self.real_key
    }

    /// Registrations recorded while the content rendered on a miss.
    pub fn recorded(&self) -> &Registrations {
        &self.recorded
    }

    pub fn init(
        &mut self,
        request: &FragmentRequest<'_>,
        registrar: &mut dyn ClientRegistrar,
    ) -> Result<(), CacheError> {
        if self.state != FragmentState::Uninitialized {
            return Ok(());
        }
        if !self.policy.is_active() {
            log::debug!(target: "cache.fragment", "{}: caching disabled", self.control_id);
            self.state = FragmentState::Disabled;
            let mut child = (self.factory)();
            child.init(registrar);
            self.child = Some(child);
            return Ok(());
        }

        let base = key::base_combiner(&self.identity, request.writer);
        self.base_key = key::finish(&base);
        let control_id = self.control_id.clone();
        let inputs = VaryInputs {
            values: request.values,
            naming_container: request.naming_container,
            control_id: &control_id,
            resolver: request.resolver,
        };

        if let Some(entry) = self.lookup(base, &inputs)? {
            log::debug!(target: "cache.fragment", "{}: hit", self.control_id);
            for call in &entry.calls {
                registrar.register(call);
            }
            self.entry = Some(entry);
            self.state = FragmentState::Hit;
            return Ok(());
        }

        self.real_key = match self.policy.vary() {
            Some(vary) => key::vary_key(base, &vary, &inputs)?,
            None => self.base_key.clone(),
        };
        log::debug!(target: "cache.fragment", "{}: miss, rendering", self.control_id);
        self.state = FragmentState::MissRendering;
        let mut child = (self.factory)();
        child.init(&mut RecordingRegistrar::new(registrar, &mut self.recorded));
        self.child = Some(child);
        Ok(())
    }

    fn lookup(
        &mut self,
        base: HashCombiner,
        inputs: &VaryInputs<'_>,
    ) -> Result<Option<Arc<CacheEntry>>, CacheError> {
        let provider = self.policy.provider.as_deref();
        let vary = match self.store.get(&self.base_key, provider) {
            None => return Ok(None),
            Some(CachedItem::Entry(entry)) => return Ok(Some(entry)),
            Some(CachedItem::Vary(vary)) => vary,
        };
        let vary_key = key::vary_key(base, &vary, inputs)?;
        let found = self.store.get(&vary_key, provider);
        self.found_vary = Some(vary.clone());
        match found {
            Some(CachedItem::Entry(entry)) if entry.cached_vary_id == Some(vary.cached_vary_id) => {
                Ok(Some(entry))
            }
            Some(_) => {
                log::debug!(
                    target: "cache.fragment",
                    "{}: evicting stale entry {vary_key}",
                    self.control_id
                );
                self.store.remove(&vary_key, provider);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub fn load(&mut self) {
        if let Some(child) = self.child.as_mut() {
            child.load();
        }
    }

    pub fn pre_render(&mut self, registrar: &mut dyn ClientRegistrar) {
        match self.state {
            FragmentState::Hit => {
                if let Some(css) = self.entry.as_ref().and_then(|entry| entry.css.as_deref()) {
                    registrar.register_css(css);
                }
            }
            FragmentState::MissRendering => {
                if let Some(child) = self.child.as_mut() {
                    child.pre_render(&mut RecordingRegistrar::new(registrar, &mut self.recorded));
                }
            }
            FragmentState::Disabled => {
                if let Some(child) = self.child.as_mut() {
                    child.pre_render(registrar);
                }
            }
            FragmentState::Uninitialized | FragmentState::MissCached => {}
        }
    }

    pub fn render(
        &mut self,
        out: &mut String,
        registrar: &mut dyn ClientRegistrar,
    ) -> Result<(), CacheError> {
        match self.state {
            FragmentState::Uninitialized => Ok(()),
            FragmentState::Disabled => match self.child.as_mut() {
                Some(child) => child.render(out, registrar),
                None => Ok(()),
            },
            FragmentState::Hit | FragmentState::MissCached => {
                if let Some(entry) = &self.entry {
                    out.push_str(&entry.output);
                    for (unique_id, argument) in &entry.validation {
                        registrar.register_for_event_validation(unique_id, argument.as_deref());
                    }
                }
                Ok(())
            }
            FragmentState::MissRendering => self.render_and_store(out, registrar),
        }
    }

    fn render_and_store(
        &mut self,
        out: &mut String,
        registrar: &mut dyn ClientRegistrar,
    ) -> Result<(), CacheError> {
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };
        let mut buffer = String::new();
        child.render(
            &mut buffer,
            &mut RecordingRegistrar::new(registrar, &mut self.recorded),
        )?;

        let vary = self.policy.vary().map(|fresh| match &self.found_vary {
            Some(existing) if **existing == fresh => existing.clone(),
            _ => Arc::new(fresh),
        });
        let recorded = std::mem::take(&mut self.recorded);
        let entry = Arc::new(CacheEntry {
            output: buffer,
            css: recorded.css,
            calls: recorded.calls,
            validation: recorded.validation,
            cached_vary_id: vary.as_ref().map(|vary| vary.cached_vary_id),
        });
        let expiration = if self.policy.sliding {
            Expiration::Sliding(self.policy.duration)
        } else {
            Expiration::Absolute(self.clock.now() + self.policy.duration)
        };
        let dependency = AggregateDependency::compose([
            self.policy.dependency.as_ref().map(|make| make()),
            self.policy.sql_dependency.as_ref().map(|make| make()),
        ]);

        let request = InsertRequest {
            base_key: self.base_key.clone(),
            vary,
            real_key: self.real_key.clone(),
            entry: entry.clone(),
            dependency: dependency.clone(),
            expiration,
            provider: self.policy.provider.clone(),
        };
        if let Err(err) = self.store.insert(request) {
            log::warn!(target: "cache.fragment", "{}: {err}", self.control_id);
            if let Some(dependency) = dependency {
                dependency.dispose();
            }
            return Err(err);
        }

        log::debug!(target: "cache.fragment", "{}: stored {}", self.control_id, self.real_key);
        out.push_str(&entry.output);
        self.entry = Some(entry);
        self.child = None;
        self.state = FragmentState::MissCached;
        Ok(())
    }
}

impl fmt::Debug for PartialCachingControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartialCachingControl")
            .field("control_id", &self.control_id)
            .field("state", &self.state)
            .field("base_key", &self.base_key)
            .field("real_key", &self.real_key)
            .finish()
    }
}

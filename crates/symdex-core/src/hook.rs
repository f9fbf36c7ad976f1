//! Ordered chain of symbol resolution callbacks.
//!
//! A host asks the chain for a symbol it does not know yet; each hook gets
//! a chance to make the symbol available as a side effect, and the chain
//! stops at the first one that succeeds.

use crate::CoreError;

/// A resolution callback.
pub type Hook = Box<dyn Fn(&str) -> Result<(), CoreError>>;

#[derive(Default)]
pub struct HookChain {
    hooks: Vec<Hook>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hook at the end of the chain, or at the front with `prepend`.
    pub fn register(
        &mut self,
        hook: impl Fn(&str) -> Result<(), CoreError> + 'static,
        prepend: bool,
    ) {
        if prepend {
            self.hooks.insert(0, Box::new(hook));
        } else {
            self.hooks.push(Box::new(hook));
        }
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run hooks in order until `is_available(name)` holds.
    ///
    /// Returns whether the symbol ended up available. A hook error stops
    /// the chain.
    pub fn dispatch(
        &self,
        name: &str,
        mut is_available: impl FnMut(&str) -> bool,
    ) -> Result<bool, CoreError> {
        for hook in &self.hooks {
            hook(name)?;
            if is_available(name) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl std::fmt::Debug for HookChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookChain")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

//! A plain in-process module registry.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::{ModuleHandle, ModuleRegistry};
use crate::core::LoaderError;

/// Records module declarations and the bootstrapped application.
#[derive(Debug, Default)]
pub struct ModuleTable {
    modules: Mutex<FxHashMap<String, Vec<String>>>,
    bootstrapped: Mutex<Option<String>>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered module names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.modules.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.lock().contains_key(name)
    }

    pub fn bootstrapped(&self) -> Option<String> {
        self.bootstrapped.lock().clone()
    }

    /// Dependencies of `main` (transitively) that were never registered.
    pub fn missing_from(&self, main: &str) -> Vec<String> {
        let modules = self.modules.lock();
        let mut missing = Vec::new();
        let mut seen = rustc_hash::FxHashSet::default();
        let mut stack = vec![main.to_owned()];

        while let Some(name) = stack.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }
            match modules.get(&name) {
                Some(requires) => stack.extend(requires.iter().cloned()),
                None => missing.push(name),
            }
        }
        missing.sort();
        missing
    }
}

impl ModuleRegistry for ModuleTable {
    fn module(&self, name: &str, requires: Option<&[String]>) -> Result<ModuleHandle, LoaderError> {
        let mut modules = self.modules.lock();
        let requires = match requires {
            Some(requires) => {
                modules.insert(name.to_owned(), requires.to_vec());
                requires.to_vec()
            }
            None => modules
                .get(name)
                .cloned()
                .ok_or_else(|| LoaderError::Host(format!("module `{name}` is not available")))?,
        };
        Ok(ModuleHandle {
            name: name.to_owned(),
            requires,
        })
    }

    fn bootstrap(&self, main: &str) -> Result<(), LoaderError> {
        if !self.contains(main) {
            return Err(LoaderError::Host(format!(
                "cannot bootstrap `{main}`: module is not registered"
            )));
        }
        *self.bootstrapped.lock() = Some(main.to_owned());
        Ok(())
    }
}

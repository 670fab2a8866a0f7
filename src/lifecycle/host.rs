//! Module host: ordered load, reverse-ordered unload.
//!
//! # Design Decisions
//! - Fail fast: the first module that fails to load aborts startup, and
//!   every module loaded before it is unloaded again
//! - Unload runs in reverse load order
//! - Dropping the host unloads whatever is still loaded

use crate::lifecycle::module::{Module, ModuleError};

#[derive(Default)]
pub struct ModuleHost {
    modules: Vec<Box<dyn Module>>,
}

impl ModuleHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `module` and keep it until [`ModuleHost::unload_all`].
    pub fn load(&mut self, mut module: Box<dyn Module>) -> Result<(), ModuleError> {
        module.on_load()?;
        self.modules.push(module);
        Ok(())
    }

    /// Load every module in order; on failure, unload the ones already loaded.
    pub fn load_all(&mut self, modules: Vec<Box<dyn Module>>) -> Result<(), ModuleError> {
        for module in modules {
            let name = module.name();
            if let Err(e) = self.load(module) {
                tracing::error!(module = name, error = %e, "Startup aborted");
                self.unload_all();
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// True while at least one module still has a running worker.
    pub fn any_active(&self) -> bool {
        self.modules.iter().any(|m| m.is_active())
    }

    pub fn unload_all(&mut self) {
        while let Some(mut module) = self.modules.pop() {
            module.on_unload();
        }
    }
}

impl Drop for ModuleHost {
    fn drop(&mut self) {
        self.unload_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        name: &'static str,
        fail: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Module for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn on_load(&mut self) -> Result<(), ModuleError> {
            if self.fail {
                return Err(ModuleError::AlreadyLoaded(self.name));
            }
            self.log.lock().unwrap().push(format!("load {}", self.name));
            Ok(())
        }

        fn on_unload(&mut self) {
            self.log.lock().unwrap().push(format!("unload {}", self.name));
        }

        fn is_active(&self) -> bool {
            true
        }
    }

    fn recorder(name: &'static str, fail: bool, log: &Arc<Mutex<Vec<String>>>) -> Box<dyn Module> {
        Box::new(Recorder {
            name,
            fail,
            log: Arc::clone(log),
        })
    }

    #[test]
    fn unloads_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut host = ModuleHost::new();
        host.load_all(vec![recorder("a", false, &log), recorder("b", false, &log)])
            .unwrap();
        assert_eq!(host.len(), 2);
        assert!(host.any_active());

        host.unload_all();
        assert!(host.is_empty());
        assert_eq!(*log.lock().unwrap(), ["load a", "load b", "unload b", "unload a"]);
    }

    #[test]
    fn failed_load_rolls_back() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut host = ModuleHost::new();
        let result = host.load_all(vec![
            recorder("a", false, &log),
            recorder("b", true, &log),
            recorder("c", false, &log),
        ]);

        assert!(result.is_err());
        assert!(host.is_empty());
        assert_eq!(*log.lock().unwrap(), ["load a", "unload a"]);
    }
}

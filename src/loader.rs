//! deno_core module loader confined to the sandbox root.
//!
//! Resolution delegates to [`SandboxRoot`]; loading re-checks admission
//! against the real file before reading it, so a specifier that somehow
//! bypassed `resolve` still cannot pull bytes from outside the root.

use std::fs;

use deno_core::error::AnyError;
use deno_core::{
    ModuleLoadResponse, ModuleLoader, ModuleSource, ModuleSourceCode, ModuleSpecifier, ModuleType,
    RequestedModuleType, ResolutionKind,
};
use url::Url;

use crate::error::ModuleError;
use crate::resolver::SandboxRoot;

pub struct ConfinedModuleLoader {
    root: SandboxRoot,
}

impl ConfinedModuleLoader {
    pub fn new(root: SandboxRoot) -> Self {
        Self { root }
    }

    fn read(&self, specifier: &ModuleSpecifier) -> Result<ModuleSource, ModuleError> {
        let path = specifier
            .to_file_path()
            .map_err(|_| ModuleError::RemoteImport(specifier.to_string()))?;
        let path = self.root.admit(&path)?;
        let code = fs::read_to_string(&path).map_err(|source| ModuleError::LoadIo {
            path: path.clone(),
            source,
        })?;
        Ok(ModuleSource::new(
            ModuleType::JavaScript,
            ModuleSourceCode::String(code.into()),
            specifier,
            None,
        ))
    }
}

impl ModuleLoader for ConfinedModuleLoader {
    fn resolve(
        &self,
        specifier: &str,
        referrer: &str,
        _kind: ResolutionKind,
    ) -> Result<ModuleSpecifier, AnyError> {
        // The bootstrap module imports the entry with an `ext:` referrer;
        // anything that is not a local file falls back to the root.
        let referrer = Url::parse(referrer).ok().filter(|u| u.scheme() == "file");
        Ok(self.root.resolve(specifier, referrer.as_ref())?)
    }

    fn load(
        &self,
        module_specifier: &ModuleSpecifier,
        _maybe_referrer: Option<&ModuleSpecifier>,
        _is_dyn_import: bool,
        _requested_module_type: RequestedModuleType,
    ) -> ModuleLoadResponse {
        ModuleLoadResponse::Sync(self.read(module_specifier).map_err(AnyError::from))
    }
}

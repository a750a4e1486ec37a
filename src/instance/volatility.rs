use crate::compile::data::{CompiledDataId, CompiledDataManager};
use crate::foundation::error::TemporaResult;
use crate::model::library::SequenceLibrary;

/// Per-update staleness check for roots whose compiled data was built from volatile sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolatilityManager {
    checks: u64,
    recompiles: u64,
}

impl VolatilityManager {
    /// Recompile `id` when any source signature changed. Returns `true` when recompiled; the
    /// caller must then drop every entity and cached query derived from the old data.
    pub fn conditional_recompile(
        &mut self,
        library: &SequenceLibrary,
        compiled: &mut CompiledDataManager,
        id: CompiledDataId,
    ) -> TemporaResult<bool> {
        self.checks += 1;
        let rebuilt = compiled.recompile_if_stale(library, id)?;
        if rebuilt {
            self.recompiles += 1;
            tracing::debug!(compiled = id.0, recompiles = self.recompiles, "volatile root rebuilt");
        }
        Ok(rebuilt)
    }

    /// Number of staleness checks so far.
    pub fn checks(&self) -> u64 {
        self.checks
    }

    /// Number of recompiles so far.
    pub fn recompiles(&self) -> u64 {
        self.recompiles
    }
}

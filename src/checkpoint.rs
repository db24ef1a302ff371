use cammap_data::CommandCatalogue;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::MapperError;
use crate::session::SessionContext;

pub fn checkpoint_path(tmp_dir: &Path, step: u32) -> PathBuf {
    tmp_dir.join(format!("res_step_{step}.json"))
}

pub fn final_artifact_path(output_dir: &Path, brand: &str, model: &str) -> PathBuf {
    output_dir.join(format!("{brand}_{model}_mapping.json"))
}

/// Persist the catalogue as the checkpoint for the current step, then
/// advance the step counter. A failed write leaves the counter alone,
/// giving the at-most-one-step-lost restart property.
pub fn save_step(session: &mut SessionContext) -> Result<(), MapperError> {
    let path = checkpoint_path(&session.config.tmp_dir, session.step);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| MapperError::Persistence(format!("{}: {e}", parent.display())))?;
    }
    session
        .catalogue
        .save(&path)
        .map_err(|e| MapperError::Persistence(format!("{e:#}")))?;
    info!("checkpoint step {} -> {}", session.step, path.display());
    session.step += 1;
    Ok(())
}

/// The catalogue to start from: empty at step 0, otherwise the previous
/// step's checkpoint. A missing or unreadable checkpoint at a nonzero
/// start step is a persistence error, not a silent fresh start.
pub fn initial_catalogue(
    tmp_dir: &Path,
    start_step: u32,
    empty: CommandCatalogue,
) -> Result<CommandCatalogue, MapperError> {
    if start_step == 0 {
        return Ok(empty);
    }
    let path = checkpoint_path(tmp_dir, start_step - 1);
    let catalogue = CommandCatalogue::load(&path)
        .map_err(|e| MapperError::Persistence(format!("{e:#}")))?;
    info!(
        "resumed catalogue from step {} ({} commands)",
        start_step - 1,
        catalogue.commands.len()
    );
    Ok(catalogue)
}

/// Write the final brand/model artifact on reaching the terminal state.
pub fn save_final(session: &SessionContext) -> Result<PathBuf, MapperError> {
    let props = session.properties()?;
    std::fs::create_dir_all(&session.config.output_dir)
        .map_err(|e| MapperError::Persistence(e.to_string()))?;
    let path = final_artifact_path(&session.config.output_dir, &props.brand, &props.model);
    session
        .catalogue
        .save(&path)
        .map_err(|e| MapperError::Persistence(format!("{e:#}")))?;
    info!("final mapping artifact -> {}", path.display());
    Ok(path)
}

//! The project: hazard, exposure and vulnerability inputs for a single impact assessment.
use crate::error::ImpactError;
use crate::feature::{Layer, Progress};
use crate::impact::{HazardData, ImpactFunction, ImpactResult};
use crate::vulnerability::VulnerabilityTable;
use log::info;

pub mod parameters;
use parameters::ProjectParameters;

/// Project definition
pub struct Project {
    /// Parameters from the project file
    pub parameters: ProjectParameters,
    /// The hazard data
    pub hazard: HazardData,
    /// Features exposed to the hazard
    pub exposure: Layer,
    /// Building types, their prices and damage factors
    pub vulnerability: VulnerabilityTable,
}

impl Project {
    /// Run the impact assessment for this project.
    ///
    /// # Returns
    ///
    /// The impact function which was used, along with its result.
    pub fn run(
        self,
        mut progress: Option<Progress>,
    ) -> Result<(ImpactFunction, ImpactResult), ImpactError> {
        // Reborrow so that the callback can be used again for the join
        let build_progress: Option<Progress> = match progress.as_mut() {
            Some(progress) => Some(&mut **progress),
            None => None,
        };
        let function = ImpactFunction::build(
            self.hazard,
            &self.parameters,
            self.vulnerability,
            build_progress,
        )?;

        info!("Running impact assessment on '{}'", self.exposure.name);
        let result = function.run(&self.exposure, progress)?;

        Ok((function, result))
    }
}

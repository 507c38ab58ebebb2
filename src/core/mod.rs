//! Surface energy balance stages

pub mod endmembers;
pub mod evapotranspiration;
pub mod pipeline;
pub mod precipitation;
pub mod radiation;
pub mod sensible_heat;
pub mod soil_heat;
pub mod solar;
pub mod spectral;
pub mod stages;

// Re-export main types
pub use endmembers::{
    Endmember, EndmemberParams, EndmemberReducer, EndmemberSelector, EndmemberStatus, HotInputs, SearchOutcome,
};
pub use evapotranspiration::{EtInputs, EtParams, EvapotranspirationEstimator};
pub use pipeline::{
    PixelDiagnostics, RegionSummary, SceneFailure, SceneImage, SceneInput, SceneProduct, SceneRecord, SceneStatus,
    SebalModel,
};
pub use precipitation::{
    DailyPrecipitationSeries, PrecipitationAggregator, PrecipitationBands, PrecipitationParams, PrecipitationProvider,
};
pub use radiation::{RadiationBalance, RadiationInputs};
pub use sensible_heat::{DtFit, SensibleHeatInputs, SensibleHeatParams, SensibleHeatResult, SensibleHeatSolver};
pub use solar::SolarGeometry;
pub use spectral::SpectralIndices;
pub use stages::{plan, Stage, StageSpec};

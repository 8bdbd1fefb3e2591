mod grid;
mod ids;
mod key;
mod record;
mod series;

pub use grid::{
    Combination, GridEnumeration, ParamValue, ParameterAxis, ParameterGrid, enumerate,
};
pub use ids::CellId;
pub use key::CombinationKey;
pub use record::{
    CellMetadata, FieldData, NETWORK, NetworkMetadata, PARAM_VALUES, ResultRecord, ResultSet,
    SIM_DATA, TraceField,
};
pub use series::TimeSeries;

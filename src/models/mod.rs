pub mod parameters;

pub use parameters::{
    canonical_order, find_spec, parameters_for, ParameterSpec, LEAF_MGKG_GROUP, LEAF_PARAMETERS,
    LEAF_PERCENT_GROUP, SOIL_PARAMETERS,
};

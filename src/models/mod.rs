pub mod feature;

pub use feature::{Feature, FeatureState, Label};

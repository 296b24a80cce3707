mod entity;
mod interpolation;

pub use entity::{EntityState, RemoteEntity};
pub use interpolation::{
    DEFAULT_TIME_CONSTANT_SECS, EntityInterpolator, InterpolationConfig, smoothing_factor,
    wrap_angle,
};

pub const CASE_NAME: &'static str = "Case Test";

pub type Float = f64;

pub const TOLERANCE: Float = 1e-6;

pub const MAX_ITER: usize = 100;

pub const RESIDUAL_CHECK_INTERVAL: usize = 10;

pub const SOR_FACTOR: Float = 1.5;

pub const PCG_RESIDUAL_RESET_INTERVAL: usize = 50;

pub const MAX_NUMBER_OF_LEVELS: usize = 5;

pub const MAX_ALLOWED_LEVELS: usize = 16;

pub const NUMBER_OF_RESTRICTION_ITER: usize = 5;

pub const NUMBER_OF_CORRECTION_ITER: usize = 5;

pub const NUMBER_OF_COARSEST_ITER: usize = 20;

pub const NUMBER_OF_FINAL_ITER: usize = 20;

pub const MG_MAX_TOLERANCE: Float = 1e-9;

pub const MIN_WEIGHT: Float = 0.01;

pub const DEFAULT_EXTRAPOLATION_DEPTH: usize = 5;

pub const MIN_STEP: usize = 10;

pub const MAX_STEP: usize = 1_000;

pub const GRAVITY: Float = -9.8;

pub const MIN_FLUID_FRACTION: Float = 0.01;

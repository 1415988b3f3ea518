// world_server_core/server/src/core/constants.rs
pub const SERVER_TICK_RATE: u64 = 20;
pub const TICK_DURATION_MS: u64 = 1000 / SERVER_TICK_RATE;

// Grid layout. The geometry catalog tiles use the same grid divisors.
pub const MAX_NUMBER_OF_GRIDS: u32 = 64;
pub const SIZE_OF_GRIDS: f32 = 533.333_3;
pub const CENTER_GRID_ID: u32 = MAX_NUMBER_OF_GRIDS / 2;
pub const CENTER_GRID_OFFSET: f32 = SIZE_OF_GRIDS / 2.0;

pub const MAX_NUMBER_OF_CELLS: u32 = 8; // cells per grid edge
pub const SIZE_OF_GRID_CELL: f32 = SIZE_OF_GRIDS / MAX_NUMBER_OF_CELLS as f32;
pub const TOTAL_NUMBER_OF_CELLS_PER_MAP: u32 = MAX_NUMBER_OF_GRIDS * MAX_NUMBER_OF_CELLS;
pub const CENTER_GRID_CELL_ID: u32 = MAX_NUMBER_OF_CELLS * MAX_NUMBER_OF_GRIDS / 2;
pub const CENTER_GRID_CELL_OFFSET: f32 = SIZE_OF_GRID_CELL / 2.0;

pub const MAP_HALFSIZE: f32 = SIZE_OF_GRIDS * MAX_NUMBER_OF_GRIDS as f32 / 2.0;

// Cells kept alive around each player, in cells from the player's cell.
pub const PLAYER_VISIBILITY_CELL_RADIUS: u32 = 1;

// Map manager timing floors
pub const MIN_MAP_UPDATE_DELAY_MS: u32 = 1;
pub const MIN_GRID_DELAY_MS: u32 = 60 * 1000;
pub const DEFAULT_GRID_CLEANUP_DELAY_MS: u32 = 5 * 60 * 1000;
pub const DEFAULT_INSTANCE_UNLOAD_DELAY_MS: u32 = 30 * 60 * 1000;
pub const DEFAULT_MAX_INSTANCES_PER_HOUR: u32 = 10;

// Random movement tuning
pub const RANDOM_MOVE_MIN_STEPS: u32 = 2;
pub const RANDOM_MOVE_MAX_STEPS: u32 = 10;
pub const RANDOM_MOVE_LOS_RETRY_MS: i32 = 200;
pub const RANDOM_MOVE_PATH_RETRY_MS: i32 = 100;
pub const RANDOM_MOVE_REST_MIN_SECS: u32 = 4;
pub const RANDOM_MOVE_REST_MAX_SECS: u32 = 10;
pub const RANDOM_MOVE_MAX_PATH_LENGTH: f32 = 30.0;

// Unit defaults
pub const DEFAULT_WALK_SPEED: f32 = 2.5;
pub const DEFAULT_RUN_SPEED: f32 = 7.0;
pub const DEFAULT_HEIGHT_SEARCH: f32 = 50.0;
pub const LOS_EYE_HEIGHT: f32 = 2.0;
pub const COLLISION_CONTACT_DISTANCE: f32 = 0.5;

// Spline validation
pub const MIN_SPLINE_VELOCITY: f32 = 0.01;
pub const MIN_SPLINE_SEGMENT_LENGTH: f32 = 0.1;

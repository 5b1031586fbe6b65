pub const DEFAULT_SERVER_NAME: &str = "lastMile";
pub const DEFAULT_THREAD_ID: &str = "1";
pub const DEFAULT_MAX_CYCLES: usize = 25;
pub const DEFAULT_TEMPERATURE: f32 = 0.0;

/// Standard sea-level pressure, in pascals.
pub const SEA_LEVEL_PASCALS: f32 = 101_325.0;

/// Given a barometric pressure in pascals, returns the altitude in meters
/// above the level where the pressure is `sea_level_pa`.
pub fn altitude_meters(pressure_pa: f32, sea_level_pa: f32) -> f32 {
    // international barometric formula, with the constants folded in the same
    // way as the SparkFun BME280 library:
    //     h = 44330.77 * (1 - (p / p0) ^ (1 / 5.2559))
    -44_330.77 * ((pressure_pa / sea_level_pa).powf(0.190_263) - 1.0)
}

/// Converts pascals to hectopascals, which is what the displays show.
pub fn hectopascals(pressure_pa: f32) -> f32 {
    pressure_pa / 100.0
}

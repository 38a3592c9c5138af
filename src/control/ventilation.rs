use super::{OccupancyState, Setpoints};

/// Demand control ventilation: compute the final damper position.
///
/// Occupied mode carries a ventilation floor of `dcv_min_position_pct`. With
/// a CO2 sensor present and the reading above target, the damper modulates
/// linearly from the floor toward fully open across `dcv_span_ppm`:
/// continuous, non-decreasing, equal to the floor at or below target.
///
/// The cooling stage's requirement composes by `max`: the economizer's
/// fully-open demand and the ventilation floor never reduce each other.
/// Unoccupied, no floor applies and the cooling contribution alone drives
/// the damper.
pub fn damper_position(
    occupancy: OccupancyState,
    setpoints: &Setpoints,
    co2_ppm: Option<u16>,
    cooling_contribution: Option<u8>,
) -> u8 {
    let dcv_required = match occupancy {
        OccupancyState::Unoccupied => 0,
        OccupancyState::Occupied => {
            let floor = setpoints.dcv_min_position_pct.min(100);
            match co2_ppm {
                Some(ppm) if ppm > setpoints.dcv_target_ppm => {
                    let excess = f32::from(ppm - setpoints.dcv_target_ppm);
                    let span = f32::from(setpoints.dcv_span_ppm.max(1));
                    let range = f32::from(100 - floor);
                    let position = f32::from(floor) + (excess / span) * range;
                    position.min(100.0) as u8
                }
                _ => floor,
            }
        }
    };

    dcv_required.max(cooling_contribution.unwrap_or(0).min(100))
}

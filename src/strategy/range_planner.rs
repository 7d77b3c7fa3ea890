use super::tick_math::{align_tick, price_to_tick};
use super::types::{RangePlan, TickRange};
use crate::constants::RANGE_OVERLAP_FRACTION;
use crate::error::BotError;

/// Computes the two adjacent ranges around `current_price`.
///
/// * `width_percent` - total width of both ranges as a percentage of price.
/// * `tick_spacing` - pool tick spacing every boundary is aligned to.
///
/// The shared transition boundary sits `5%` of the range below the current
/// price, so at mint time the lower range is entirely below price (quote only)
/// and the upper range straddles it. The outer upper bound rounds up, the
/// other two boundaries round down.
pub fn plan_ranges(
    current_price: f64,
    width_percent: f64,
    tick_spacing: i32,
    decimals0: u8,
    decimals1: u8,
) -> Result<RangePlan, BotError> {
    if !current_price.is_finite() || current_price <= 0.0 {
        return Err(BotError::InvalidPrice(current_price));
    }
    if !(width_percent > 0.0 && width_percent < 200.0) {
        return Err(BotError::ValidationError(format!(
            "width_percent {} must be within (0, 200)",
            width_percent
        )));
    }
    if tick_spacing <= 0 {
        return Err(BotError::InvalidTickSpacing(tick_spacing));
    }

    let price_range = current_price * width_percent / 100.0;
    let overlap = price_range * RANGE_OVERLAP_FRACTION;

    let upper_bound_price = current_price + price_range / 2.0;
    let transition_price = current_price - overlap;
    let lower_bound_price = current_price - price_range / 2.0;

    let upper_bound_tick = align_tick(
        price_to_tick(upper_bound_price, decimals0, decimals1)?,
        tick_spacing,
        true,
    )?;
    let transition_tick = align_tick(
        price_to_tick(transition_price, decimals0, decimals1)?,
        tick_spacing,
        false,
    )?;
    let lower_bound_tick = align_tick(
        price_to_tick(lower_bound_price, decimals0, decimals1)?,
        tick_spacing,
        false,
    )?;

    if !(lower_bound_tick < transition_tick && transition_tick < upper_bound_tick) {
        return Err(BotError::DegenerateRange {
            lower: lower_bound_tick,
            transition: transition_tick,
            upper: upper_bound_tick,
        });
    }

    Ok(RangePlan {
        lower_ticks: TickRange::new(lower_bound_tick, transition_tick),
        upper_ticks: TickRange::new(transition_tick, upper_bound_tick),
        transition_tick,
        lower_bound_price,
        transition_price,
        upper_bound_price,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_plan_scenario_2500_width_20() {
        // range = 500, overlap = 25
        let spacing = 60;
        let plan = plan_ranges(2500.0, 20.0, spacing, 18, 6).unwrap();

        assert!((plan.upper_bound_price - 2750.0).abs() < 1e-9);
        assert!((plan.transition_price - 2475.0).abs() < 1e-9);
        assert!((plan.lower_bound_price - 2250.0).abs() < 1e-9);

        let lower = align_tick(price_to_tick(2250.0, 18, 6).unwrap(), spacing, false).unwrap();
        let transition =
            align_tick(price_to_tick(2475.0, 18, 6).unwrap(), spacing, false).unwrap();
        let upper = align_tick(price_to_tick(2750.0, 18, 6).unwrap(), spacing, true).unwrap();

        assert_eq!(plan.lower_ticks, TickRange::new(lower, transition));
        assert_eq!(plan.upper_ticks, TickRange::new(transition, upper));
        assert_eq!(plan.transition_tick, transition);
        assert!(lower < transition && transition < upper);
        for tick in [lower, transition, upper] {
            assert_eq!(tick.rem_euclid(spacing), 0);
        }
    }

    #[test]
    fn test_transition_below_current_tick() {
        let plan = plan_ranges(2500.0, 20.0, 10, 18, 6).unwrap();
        let current = price_to_tick(2500.0, 18, 6).unwrap();
        assert!(plan.transition_tick <= current);
        assert!(plan.upper_ticks.upper > current);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            plan_ranges(0.0, 20.0, 60, 18, 6),
            Err(BotError::InvalidPrice(_))
        ));
        assert!(matches!(
            plan_ranges(2500.0, 0.0, 60, 18, 6),
            Err(BotError::ValidationError(_))
        ));
        assert!(matches!(
            plan_ranges(2500.0, 200.0, 60, 18, 6),
            Err(BotError::ValidationError(_))
        ));
        assert!(matches!(
            plan_ranges(2500.0, 20.0, 0, 18, 6),
            Err(BotError::InvalidTickSpacing(0))
        ));
    }

    #[test]
    fn test_degenerate_width_is_rejected() {
        // 0.01% width with 200-tick spacing collapses onto one boundary
        let res = plan_ranges(2500.0, 0.01, 200, 18, 6);
        assert!(matches!(res, Err(BotError::DegenerateRange { .. })));
    }

    proptest! {
        #[test]
        fn prop_ranges_strictly_ordered(
            price in 1e-4f64..1e5,
            width in 0.01f64..199.99,
            spacing in prop_oneof![Just(1i32), Just(10), Just(60), Just(200)],
        ) {
            match plan_ranges(price, width, spacing, 18, 6) {
                Ok(plan) => {
                    prop_assert!(plan.lower_ticks.lower < plan.transition_tick);
                    prop_assert!(plan.transition_tick < plan.upper_ticks.upper);
                    prop_assert_eq!(plan.lower_ticks.upper, plan.upper_ticks.lower);
                    prop_assert_eq!(plan.transition_tick.rem_euclid(spacing), 0);
                    prop_assert_eq!(plan.lower_ticks.lower.rem_euclid(spacing), 0);
                    prop_assert_eq!(plan.upper_ticks.upper.rem_euclid(spacing), 0);
                }
                Err(BotError::DegenerateRange { .. }) => {}
                Err(e) => prop_assert!(false, "unexpected error {}", e),
            }
        }

        #[test]
        fn prop_wide_ranges_never_degenerate(
            price in 1e-4f64..1e5,
            width in 10.0f64..199.0,
            spacing in prop_oneof![Just(1i32), Just(10), Just(60), Just(200)],
        ) {
            prop_assert!(plan_ranges(price, width, spacing, 18, 6).is_ok());
        }
    }
}

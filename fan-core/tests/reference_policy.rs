use fan_core::reference::{FanCurve, ReferencePolicy, TempSource, interpolate};

const CURVE: FanCurve = FanCurve {
    turn_off: 120,
    turn_on: 132,
    min_rpm: 650,
    temperatures: [155, 189, 223, 246],
    speeds: [660, 750, 1_100, 1_100],
};

fn policy(source: TempSource) -> ReferencePolicy {
    ReferencePolicy {
        source: source.as_raw(),
        curve: CURVE,
    }
}

#[test]
fn hysteresis_holds_minimum_until_turn_off() {
    let policy = policy(TempSource::Sensor1);
    let mut previous = 0;
    let mut references = Vec::new();

    for temperature in [100, 125, 200, 125, 100] {
        let output = policy.evaluate([temperature, 0], previous);
        assert!(!output.healed);
        references.push(output.reference);
        previous = output.reference;
    }

    assert_eq!(references, [0, 0, 863, 650, 0]);
}

#[test]
fn interpolation_uses_exact_integer_formula() {
    let reference = CURVE.reference(170, 0);
    let expected = 660 + (750 - 660) * (170 - 155) / (189 - 155);

    assert_eq!(reference, expected);
    assert!(reference > 660 && reference < 750, "{reference} must lie strictly inside");
}

#[test]
fn table_endpoints_are_reached_exactly() {
    for (temperature, speed) in CURVE.temperatures.into_iter().zip(CURVE.speeds) {
        assert_eq!(CURVE.reference(temperature, 0), speed, "at {temperature}");
    }
}

#[test]
fn turn_on_point_is_still_in_the_band() {
    assert_eq!(CURVE.reference(CURVE.turn_on, 0), 0);
    assert_eq!(CURVE.reference(CURVE.turn_on, 700), CURVE.min_rpm);
    assert_eq!(CURVE.reference(CURVE.turn_on + 1, 0), 650);
}

#[test]
fn selectors_pick_the_expected_sensor() {
    let temperatures = [140, 250];
    assert_eq!(policy(TempSource::Sensor1).evaluate(temperatures, 0).reference, 653);
    assert_eq!(policy(TempSource::Sensor2).evaluate(temperatures, 0).reference, 1_100);
    assert_eq!(policy(TempSource::Max).evaluate(temperatures, 0).reference, 1_100);
    // Mean of 140 and 250 is 195.
    assert_eq!(
        policy(TempSource::Mean).evaluate(temperatures, 0).reference,
        interpolate(195, (189, 750), (223, 1_100))
    );
}

#[test]
fn invalid_selector_uses_hotter_sensor() {
    let policy = ReferencePolicy {
        source: 7,
        curve: CURVE,
    };
    let output = policy.evaluate([100, 250], 0);
    assert!(output.healed);
    assert_eq!(output.reference, 1_100);
}

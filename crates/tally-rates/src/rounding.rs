/// Round `value` to `scale` decimal places with half-up semantics
/// (ties round away from zero), matching how a decimal library would
/// round the value's shortest decimal representation. Binary floats
/// like 2.00005 sit just below the tie in base 2, so rounding is done
/// on the decimal digits rather than by scaling the float.
#[must_use]
pub fn round_half_up(value: f64, scale: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }

    let repr = format!("{value}");
    let (negative, digits) = match repr.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, repr.as_str()),
    };

    let Some((int_part, frac_part)) = digits.split_once('.') else {
        return value;
    };
    if frac_part.len() <= scale {
        // Already at or below the requested scale; rounding is a no-op.
        return value;
    }

    let kept = &frac_part[..scale];
    let next_digit = frac_part.as_bytes()[scale] - b'0';

    // Unreachable for finite f64 inputs (a float with fractional
    // digits has far fewer significant digits than i128 holds), but a
    // parse failure must never substitute a wrong number.
    let Ok(mut unscaled) = format!("{int_part}{kept}").parse::<i128>() else {
        return value;
    };
    if next_digit >= 5 {
        unscaled += 1;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    let rounded = unscaled as f64 / 10f64.powi(scale as i32);
    if negative {
        -rounded
    } else {
        rounded
    }
}

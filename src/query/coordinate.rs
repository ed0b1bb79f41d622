/// A requested dimension: absolute pixels or a percentage of the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coordinate {
    Pixels(i32),
    Percent(f64),
}

impl Coordinate {
    /// Parse `"300"`, `"300.4"`, `"50p"` or `"50%"`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Some(pct) = raw.strip_suffix('p').or_else(|| raw.strip_suffix('%')) {
            let value: f64 = pct.parse().ok()?;
            return value.is_finite().then_some(Coordinate::Percent(value));
        }
        if let Ok(px) = raw.parse::<i32>() {
            return Some(Coordinate::Pixels(px));
        }
        let value: f64 = raw.parse().ok()?;
        if !value.is_finite() || value.abs() > i32::MAX as f64 {
            return None;
        }
        Some(Coordinate::Pixels(value.round() as i32))
    }

    /// Resolve against a base dimension (the source width or height).
    pub fn to_pixels(self, base: i32) -> i32 {
        match self {
            Coordinate::Pixels(px) => px,
            Coordinate::Percent(pct) => {
                let px = (base as f64 * pct / 100.0).round();
                px.clamp(i32::MIN as f64, i32::MAX as f64) as i32
            }
        }
    }
}

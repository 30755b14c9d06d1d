// rf-core/src/units.rs

use uom::si::f64::{Length as UomLength, Time as UomTime, Velocity as UomVelocity};

// Public canonical unit types (SI, f64)
pub type Length = UomLength;
pub type Time = UomTime;
pub type Velocity = UomVelocity;

#[inline]
pub fn m(v: f64) -> Length {
    use uom::si::length::meter;
    Length::new::<meter>(v)
}

#[inline]
pub fn km(v: f64) -> Length {
    use uom::si::length::kilometer;
    Length::new::<kilometer>(v)
}

#[inline]
pub fn s(v: f64) -> Time {
    use uom::si::time::second;
    Time::new::<second>(v)
}

#[inline]
pub fn mps(v: f64) -> Velocity {
    use uom::si::velocity::meter_per_second;
    Velocity::new::<meter_per_second>(v)
}

/// Length expressed in kilometers (densities are vehicles per lane-kilometer).
#[inline]
pub fn to_km(l: Length) -> f64 {
    use uom::si::length::kilometer;
    l.get::<kilometer>()
}

/// Time expressed in hours (flows are vehicles per hour).
#[inline]
pub fn to_hours(t: Time) -> f64 {
    use uom::si::time::hour;
    t.get::<hour>()
}

/// Time expressed in seconds.
#[inline]
pub fn to_seconds(t: Time) -> f64 {
    use uom::si::time::second;
    t.get::<second>()
}

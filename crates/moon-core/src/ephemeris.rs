//! Low-precision built-in calculator.
//!
//! Mean orbital elements plus the largest periodic terms of the lunar
//! longitude, good to a degree or so. Lunar visibility is the illuminated
//! fraction from the Sun-Moon elongation; solar rise and set come from the
//! hour-angle equation at the standard altitude of -0.833 degrees.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::calculator::{ComputeError, DayCalculator, Location};
use crate::constants::{J2000_JD, UNIX_EPOCH_JD};
use crate::day::{RawDayFacts, RiseSet};

/// Apparent altitude of the Sun's upper limb at rise and set, refraction included.
const SUNRISE_ALTITUDE_DEG: f64 = -0.833;

#[derive(Clone, Copy, Debug, Default)]
pub struct MeanEphemeris;

impl MeanEphemeris {
    pub fn new() -> Self {
        Self
    }
}

impl DayCalculator for MeanEphemeris {
    fn compute_day(&self, date: NaiveDate, location: &Location) -> Result<RawDayFacts, ComputeError> {
        let jd_midnight = julian_day_at_midnight(date);
        // Local civil noon.
        let jd_noon = jd_midnight + 0.5 - f64::from(location.utc_offset_minutes) / 1440.0;

        let sun = sun_position(jd_noon);
        let moon_longitude = moon_longitude(jd_noon);
        let elongation = (moon_longitude - sun.longitude).to_radians();
        let lunar_visibility = (1.0 - elongation.cos()) / 2.0;

        let solar_rise_set = match solar_rise_set(jd_midnight, location) {
            Some((rise, set)) => Some(RiseSet {
                rise: jd_to_utc(rise).ok_or_else(|| ComputeError::new(date, "sunrise out of range"))?,
                set: jd_to_utc(set).ok_or_else(|| ComputeError::new(date, "sunset out of range"))?,
            }),
            None => None,
        };

        Ok(RawDayFacts {
            lunar_visibility,
            lunar_longitude: moon_longitude,
            lunar_rise_set: None,
            solar_rise_set,
        })
    }
}

fn julian_day_at_midnight(date: NaiveDate) -> f64 {
    let seconds = date.and_time(NaiveTime::MIN).and_utc().timestamp();
    seconds as f64 / 86_400.0 + UNIX_EPOCH_JD
}

fn jd_to_utc(jd: f64) -> Option<DateTime<Utc>> {
    let millis = ((jd - UNIX_EPOCH_JD) * 86_400_000.0).round();
    DateTime::from_timestamp_millis(millis as i64)
}

fn normalize_degrees(deg: f64) -> f64 {
    deg.rem_euclid(360.0)
}

struct SunPosition {
    /// Mean longitude, degrees.
    mean_longitude: f64,
    /// Apparent ecliptic longitude, degrees.
    longitude: f64,
    /// Radians.
    right_ascension: f64,
    /// Radians.
    declination: f64,
}

fn sun_position(jd: f64) -> SunPosition {
    let d = jd - J2000_JD;
    let mean_longitude = normalize_degrees(280.466_46 + 0.985_647_4 * d);
    let mean_anomaly = (357.529_11 + 0.985_600_28 * d).to_radians();
    let longitude = normalize_degrees(
        mean_longitude + 1.914_602 * mean_anomaly.sin() + 0.019_993 * (2.0 * mean_anomaly).sin(),
    );

    let obliquity = (23.439 - 0.000_000_4 * d).to_radians();
    let lambda = longitude.to_radians();
    let right_ascension = (obliquity.cos() * lambda.sin()).atan2(lambda.cos());
    let declination = (obliquity.sin() * lambda.sin()).asin();

    SunPosition {
        mean_longitude,
        longitude,
        right_ascension,
        declination,
    }
}

/// Geocentric ecliptic longitude of the Moon in degrees.
fn moon_longitude(jd: f64) -> f64 {
    let d = jd - J2000_JD;
    let mean_longitude = 218.316_447_7 + 13.176_396_48 * d;
    let elongation = (297.850_192_1 + 12.190_749_12 * d).to_radians();
    let sun_anomaly = (357.529_109_2 + 0.985_600_28 * d).to_radians();
    let moon_anomaly = (134.963_396_4 + 13.064_992_95 * d).to_radians();
    let latitude_arg = (93.272_095_0 + 13.229_350_24 * d).to_radians();

    normalize_degrees(
        mean_longitude + 6.289 * moon_anomaly.sin() + 1.274 * (2.0 * elongation - moon_anomaly).sin()
            + 0.658 * (2.0 * elongation).sin()
            + 0.214 * (2.0 * moon_anomaly).sin()
            - 0.186 * sun_anomaly.sin()
            - 0.114 * (2.0 * latitude_arg).sin(),
    )
}

/// Sunrise and sunset as Julian days, `None` in polar day or night.
fn solar_rise_set(jd_midnight: f64, location: &Location) -> Option<(f64, f64)> {
    let approx_noon = jd_midnight + 0.5 - location.longitude / 360.0;
    let sun = sun_position(approx_noon);

    let phi = location.latitude.to_radians();
    let h0 = SUNRISE_ALTITUDE_DEG.to_radians();
    let cos_h0 = (h0.sin() - phi.sin() * sun.declination.sin()) / (phi.cos() * sun.declination.cos());
    if !(-1.0..=1.0).contains(&cos_h0) {
        return None;
    }
    let half_day = cos_h0.acos().to_degrees() / 360.0;

    // Equation of time, in degrees of hour angle.
    let eot = {
        let diff = sun.mean_longitude - 0.005_718_3 - sun.right_ascension.to_degrees();
        (diff + 180.0).rem_euclid(360.0) - 180.0
    };
    let noon = approx_noon - eot / 360.0;
    Some((noon - half_day, noon + half_day))
}

//! Fare calculation
//!
//! Pure pricing: the same distance, duration, local time and surcharge factors
//! always give the same breakdown. Amounts stay `f64` until display.

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

/// Pricing constants, in the smallest whole currency unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareRates {
    pub base_fare: f64,
    pub per_km: f64,
    pub per_minute: f64,
    pub vat_rate: f64,
    /// Weekday 07-09h and 17-19h
    pub rush_hour_factor: f64,
    /// Any day 11:30-13:30
    pub lunch_factor: f64,
}

impl Default for FareRates {
    fn default() -> Self {
        Self {
            base_fare: 15_000.0,
            per_km: 12_000.0,
            per_minute: 500.0,
            vat_rate: 0.10,
            rush_hour_factor: 0.08,
            lunch_factor: 0.05,
        }
    }
}

/// Condition-based surcharge factors supplied by a pluggable policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SurchargeFactors {
    pub weather: f64,
    pub traffic: f64,
}

impl SurchargeFactors {
    pub fn new(weather: f64, traffic: f64) -> Self {
        Self { weather, traffic }
    }

    /// Clamp both factors into [0, 1]; non-finite values count as no surcharge
    pub fn sanitized(self) -> Self {
        Self {
            weather: clamp_factor(self.weather),
            traffic: clamp_factor(self.traffic),
        }
    }
}

fn clamp_factor(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Itemized trip cost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FareBreakdown {
    pub base_fare: f64,
    pub distance_fare: f64,
    pub time_fare: f64,
    pub subtotal: f64,
    pub rush_hour_surcharge: f64,
    pub weather_surcharge: f64,
    pub traffic_surcharge: f64,
    pub total_surcharge: f64,
    pub vat: f64,
    pub total: f64,
}

impl FareRates {
    /// Price a trip
    ///
    /// Negative or non-finite distance and duration are treated as zero.
    pub fn compute(
        &self,
        distance_km: f64,
        duration_min: f64,
        now: NaiveDateTime,
        factors: SurchargeFactors,
    ) -> FareBreakdown {
        let distance_km = non_negative(distance_km);
        let duration_min = non_negative(duration_min);
        let factors = factors.sanitized();

        let base_fare = self.base_fare;
        let distance_fare = distance_km * self.per_km;
        let time_fare = duration_min * self.per_minute;
        let subtotal = base_fare + distance_fare + time_fare;

        let rush_hour_surcharge = subtotal * self.time_of_day_factor(now);
        let weather_surcharge = subtotal * factors.weather;
        let traffic_surcharge = subtotal * factors.traffic;
        let total_surcharge = rush_hour_surcharge + weather_surcharge + traffic_surcharge;

        let vat = (subtotal + total_surcharge) * self.vat_rate;
        let total = subtotal + total_surcharge + vat;

        FareBreakdown {
            base_fare,
            distance_fare,
            time_fare,
            subtotal,
            rush_hour_surcharge,
            weather_surcharge,
            traffic_surcharge,
            total_surcharge,
            vat,
            total,
        }
    }

    /// Time-of-day surcharge factor for a local wall-clock time
    ///
    /// The weekday rush band is checked first and wins over the lunch band.
    pub fn time_of_day_factor(&self, now: NaiveDateTime) -> f64 {
        if is_weekday_rush_hour(now) {
            self.rush_hour_factor
        } else if is_lunch_hour(now) {
            self.lunch_factor
        } else {
            0.0
        }
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn is_weekday_rush_hour(now: NaiveDateTime) -> bool {
    let weekday = !matches!(now.weekday(), Weekday::Sat | Weekday::Sun);
    let hour = now.hour();
    weekday && ((7..=9).contains(&hour) || (17..=19).contains(&hour))
}

// Fractional hour, half-open: 11:30 is in, 13:30 is out
fn is_lunch_hour(now: NaiveDateTime) -> bool {
    let hour = now.hour() as f64 + now.minute() as f64 / 60.0;
    (11.5..13.5).contains(&hour)
}

/// Price a trip with the default rates
pub fn compute_fare(
    distance_km: f64,
    duration_min: f64,
    now: NaiveDateTime,
    factors: SurchargeFactors,
) -> FareBreakdown {
    FareRates::default().compute(distance_km, duration_min, now, factors)
}

/// Time-of-day factor with the default rates: 0.08, 0.05 or 0
pub fn rush_hour_factor(now: NaiveDateTime) -> f64 {
    FareRates::default().time_of_day_factor(now)
}

/// Round to whole currency units, half away from zero
pub fn round_amount(value: f64) -> i64 {
    value.round() as i64
}

/// Render an amount as whole units with `.` thousands separators, e.g. `159.500 ₫`
pub fn format_amount(value: f64) -> String {
    let rounded = round_amount(value);
    let digits = rounded.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    if rounded < 0 {
        format!("-{grouped} ₫")
    } else {
        format!("{grouped} ₫")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const EPS: f64 = 1e-6;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    // 2026-10-20 is a Tuesday, 2026-10-24 a Saturday
    fn tuesday(h: u32, min: u32) -> NaiveDateTime {
        at(2026, 10, 20, h, min)
    }

    fn saturday(h: u32, min: u32) -> NaiveDateTime {
        at(2026, 10, 24, h, min)
    }

    #[test]
    fn test_off_peak_ten_km_trip() {
        let fare = compute_fare(10.0, 20.0, tuesday(15, 0), SurchargeFactors::default());

        assert!((fare.distance_fare - 120_000.0).abs() < EPS);
        assert!((fare.time_fare - 10_000.0).abs() < EPS);
        assert!((fare.subtotal - 145_000.0).abs() < EPS);
        assert!(fare.total_surcharge.abs() < EPS);
        assert!((fare.vat - 14_500.0).abs() < EPS);
        assert!((fare.total - 159_500.0).abs() < EPS);
    }

    #[test]
    fn test_tuesday_morning_rush_trip() {
        let fare = compute_fare(10.0, 20.0, tuesday(8, 0), SurchargeFactors::default());

        assert!((fare.rush_hour_surcharge - 11_600.0).abs() < EPS);
        assert!((fare.total_surcharge - 11_600.0).abs() < EPS);
        assert!((fare.vat - 15_660.0).abs() < EPS);
        assert!((fare.total - 172_260.0).abs() < EPS);
    }

    #[test]
    fn test_total_matches_closed_form() {
        let factors = SurchargeFactors::new(0.1, 0.15);
        for (km, min) in [(0.0, 0.0), (3.2, 11.0), (27.5, 64.0)] {
            for now in [tuesday(8, 15), tuesday(12, 0), saturday(3, 0)] {
                let fare = compute_fare(km, min, now, factors);
                let subtotal = 15_000.0 + km * 12_000.0 + min * 500.0;
                let sum = rush_hour_factor(now) + 0.1 + 0.15;
                assert!((fare.subtotal - subtotal).abs() < EPS);
                assert!((fare.total - subtotal * (1.0 + sum) * 1.10).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn test_rush_hour_weekday_hours() {
        for hour in [7, 8, 9, 17, 18, 19] {
            assert_eq!(rush_hour_factor(tuesday(hour, 0)), 0.08, "hour {hour}");
            assert_eq!(rush_hour_factor(tuesday(hour, 59)), 0.08, "hour {hour}:59");
        }
        assert_eq!(rush_hour_factor(tuesday(6, 59)), 0.0);
        assert_eq!(rush_hour_factor(tuesday(10, 0)), 0.0);
        assert_eq!(rush_hour_factor(tuesday(20, 0)), 0.0);
    }

    #[test]
    fn test_rush_hour_not_applied_on_weekend() {
        assert_eq!(rush_hour_factor(saturday(8, 0)), 0.0);
        assert_eq!(rush_hour_factor(saturday(18, 30)), 0.0);
    }

    #[test]
    fn test_lunch_band_any_day() {
        assert_eq!(rush_hour_factor(tuesday(11, 30)), 0.05);
        assert_eq!(rush_hour_factor(tuesday(13, 29)), 0.05);
        assert_eq!(rush_hour_factor(saturday(12, 0)), 0.05);

        assert_eq!(rush_hour_factor(tuesday(11, 29)), 0.0);
        assert_eq!(rush_hour_factor(tuesday(13, 30)), 0.0);
    }

    #[test]
    fn test_surcharge_factors_are_clamped() {
        let fare = compute_fare(1.0, 1.0, saturday(3, 0), SurchargeFactors::new(3.0, f64::NAN));
        assert!((fare.weather_surcharge - fare.subtotal).abs() < EPS);
        assert_eq!(fare.traffic_surcharge, 0.0);
    }

    #[test]
    fn test_negative_inputs_count_as_zero() {
        let fare = compute_fare(-4.0, f64::NAN, saturday(3, 0), SurchargeFactors::default());
        assert_eq!(fare.subtotal, 15_000.0);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(159_500.0), "159.500 ₫");
        assert_eq!(format_amount(172_259.6), "172.260 ₫");
        assert_eq!(format_amount(999.4), "999 ₫");
        assert_eq!(format_amount(1_000_000.0), "1.000.000 ₫");
        assert_eq!(format_amount(0.0), "0 ₫");
        assert_eq!(round_amount(2.5), 3);
    }
}

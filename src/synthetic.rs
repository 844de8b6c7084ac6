//! Seeded generator for the synthetic car table.
//!
//! Only attributes that cannot be read off an image are produced: usage,
//! registration and ownership details.

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::dataset::CarAttributes;

pub const FIRST_YEAR: u16 = 2000;
pub const CURRENT_YEAR: u16 = 2025;
pub const MAX_MILEAGE: u32 = 200_000;

pub const FUEL_TYPES: &[&str] = &["Gasoline", "Diesel", "Hybrid", "Electric", "Plug-in Hybrid"];
pub const TRANSMISSIONS: &[&str] = &["Automatic", "Manual", "CVT"];

const VIN_CHARS: &[u8] = b"ABCDEFGHJKLMNPRSTUVWXYZ0123456789";
const VIN_LENGTH: usize = 17;

/// One piece of a number plate layout.
#[derive(Debug, Clone, Copy)]
enum PlateToken {
    /// One of the listed strings.
    Pick(&'static [&'static str]),
    /// An integer in the inclusive range, without padding.
    Number(u32, u32),
    Lit(&'static str),
}

use PlateToken::{Lit, Number, Pick};

const A3: &[&str] = &["A", "B", "C"];
const A4: &[&str] = &["A", "B", "C", "D"];
const A5: &[&str] = &["A", "B", "C", "D", "E"];
const AB2: &[&str] = &["A", "B"];
const PAIRS2: &[&str] = &["AB", "CD"];
const PAIRS3: &[&str] = &["AB", "CD", "EF"];
const TRIPLES2: &[&str] = &["ABC", "DEF"];
const TRIPLES3: &[&str] = &["ABC", "DEF", "GHI"];

const GENERIC_PLATE: &[PlateToken] = &[Pick(A3), Number(1000, 9999), Pick(A3)];

const PLATE_FORMATS: &[(&str, &[PlateToken])] = &[
    ("USA", &[Pick(&["A", "B", "C", "D", "E", "F"]), Number(100, 999), Pick(A4)]),
    ("Canada", &[Pick(A3), Number(1000, 9999), Pick(AB2)]),
    ("Mexico", &[Pick(A3), Number(100, 999), Pick(A3)]),
    ("Germany", &[Pick(&["B", "M", "H", "K"]), Pick(A3), Number(100, 9999)]),
    ("Japan", &[Pick(&["あ", "い", "う"]), Number(10, 99), Pick(A3), Number(1000, 9999)]),
    ("UK", &[Pick(&["AB", "CD", "EF", "GH"]), Number(10, 99), Pick(A3), Number(100, 999)]),
    ("France", &[Number(100, 999), Pick(PAIRS3), Number(10, 99)]),
    ("Italy", &[Pick(PAIRS3), Number(100, 999), Pick(A3)]),
    ("South Korea", &[Pick(&["가", "나", "다"]), Number(10, 99), Pick(A3), Number(1000, 9999)]),
    ("China", &[Pick(&["京", "沪", "粤"]), Pick(A5), Number(1000, 9999)]),
    ("Australia", &[Pick(TRIPLES3), Number(100, 999)]),
    ("Brazil", &[Lit("ABC"), Number(1000, 9999), Pick(A3)]),
    ("India", &[Pick(&["DL", "MH", "KA", "TN"]), Number(10, 99), Pick(A3), Number(1000, 9999)]),
    ("Spain", &[Number(1000, 9999), Pick(TRIPLES3)]),
    ("Netherlands", &[Number(10, 99), Lit("-"), Pick(TRIPLES3), Lit("-"), Number(1, 9)]),
    ("Belgium", &[Pick(TRIPLES2), Lit("-"), Number(100, 999)]),
    ("Switzerland", &[Pick(PAIRS3), Lit(" "), Number(10000, 99999)]),
    ("Austria", &[Pick(A5), Lit(" "), Number(10000, 99999), Lit(" "), Pick(PAIRS2)]),
    ("Sweden", &[Pick(TRIPLES3), Lit(" "), Number(100, 999)]),
    ("Norway", &[Pick(PAIRS3), Lit(" "), Number(10000, 99999)]),
    ("Denmark", &[Pick(PAIRS3), Lit(" "), Number(10, 99), Lit(" "), Number(100, 999)]),
    ("Finland", &[Pick(TRIPLES2), Lit("-"), Number(100, 999)]),
    ("Poland", &[Pick(TRIPLES3), Lit(" "), Number(10000, 99999)]),
    ("Czech Republic", &[Number(1, 9), Pick(A3), Number(1, 9), Lit(" "), Number(1000, 9999)]),
    ("Portugal", &[Number(10, 99), Lit("-"), Pick(PAIRS3), Lit("-"), Number(10, 99)]),
    ("Greece", &[Pick(TRIPLES2), Lit("-"), Number(1000, 9999)]),
    ("Turkey", &[Number(10, 99), Lit(" "), Pick(TRIPLES2), Lit(" "), Number(100, 999)]),
    ("Ukraine", &[Pick(PAIRS3), Lit(" "), Number(1000, 9999), Lit(" "), Pick(PAIRS2)]),
    ("Argentina", &[Pick(TRIPLES2), Lit(" "), Number(100, 999)]),
    ("Chile", &[Pick(&["ABCD", "EFGH"]), Lit("-"), Number(10, 99)]),
    ("Colombia", &[Pick(TRIPLES2), Lit("-"), Number(100, 999)]),
    ("Peru", &[Pick(TRIPLES2), Lit("-"), Number(1000, 9999)]),
    ("Venezuela", &[Pick(TRIPLES2), Lit("-"), Number(100, 999), Pick(PAIRS2)]),
    ("New Zealand", &[Pick(TRIPLES3), Number(100, 999)]),
    ("South Africa", &[Pick(TRIPLES2), Lit(" "), Number(100, 999), Lit(" "), Pick(&["GP", "WC", "KZN"])]),
    ("Egypt", &[Number(10000, 99999)]),
    ("Saudi Arabia", &[Number(1000, 9999), Lit("-"), Number(10, 99)]),
    ("UAE", &[Number(10000, 99999)]),
    ("Thailand", &[Pick(&["ก", "ข", "ค"]), Pick(&["ก", "ข"]), Lit(" "), Number(1000, 9999)]),
    ("Malaysia", &[Pick(TRIPLES2), Lit(" "), Number(1000, 9999)]),
    ("Singapore", &[Pick(TRIPLES3), Number(1000, 9999), Pick(A3)]),
    ("Indonesia", &[Pick(A4), Lit(" "), Number(1000, 9999), Lit(" "), Pick(TRIPLES2)]),
    ("Philippines", &[Pick(TRIPLES2), Lit("-"), Number(1000, 9999)]),
    ("Vietnam", &[Number(10, 99), Pick(A3), Lit("-"), Number(10000, 99999)]),
    ("Taiwan", &[Pick(TRIPLES2), Lit("-"), Number(1000, 9999)]),
    ("Hong Kong", &[Pick(PAIRS3), Number(1000, 9999)]),
    ("Israel", &[Number(10, 99), Lit("-"), Number(100, 999), Lit("-"), Number(10, 99)]),
    ("Ireland", &[Number(10, 99), Lit("-"), Pick(PAIRS3), Lit("-"), Number(10000, 99999)]),
    ("Romania", &[Pick(PAIRS3), Lit("-"), Number(10, 99), Lit("-"), Pick(TRIPLES2)]),
    ("Bulgaria", &[Pick(PAIRS3), Lit(" "), Number(1000, 9999), Lit(" "), Pick(PAIRS2)]),
    ("Hungary", &[Pick(TRIPLES2), Lit("-"), Number(100, 999)]),
    ("Bangladesh", &[Pick(TRIPLES2), Lit("-"), Number(10, 99), Lit("-"), Number(1000, 9999)]),
    ("Pakistan", &[Pick(TRIPLES2), Lit("-"), Number(1000, 9999)]),
    ("Sri Lanka", &[Pick(TRIPLES2), Lit("-"), Number(1000, 9999)]),
];

// (upper bound of the wear band, owner counts, weights)
const OWNER_BANDS: &[(f64, &[u8], &[u32])] = &[
    (0.2, &[0, 1], &[70, 30]),
    (0.4, &[0, 1, 2], &[40, 50, 10]),
    (0.6, &[0, 1, 2, 3], &[10, 50, 30, 10]),
    (0.8, &[1, 2, 3, 4], &[20, 40, 30, 10]),
    (f64::INFINITY, &[2, 3, 4, 5, 6], &[20, 30, 25, 15, 10]),
];

/// Every country a generated car can be registered in.
pub fn countries() -> impl Iterator<Item = &'static str> {
    PLATE_FORMATS.iter().map(|(country, _)| *country)
}

pub fn generate_cars<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<CarAttributes> {
    debug!(count, "generating synthetic cars");
    (0..count).map(|_| generate_car(rng)).collect()
}

/// Convenience wrapper seeding a ChaCha generator.
pub fn generate_cars_seeded(count: usize, seed: u64) -> Vec<CarAttributes> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    generate_cars(count, &mut rng)
}

fn generate_car<R: Rng + ?Sized>(rng: &mut R) -> CarAttributes {
    let year = rng.random_range(FIRST_YEAR..=CURRENT_YEAR);
    let mileage = rng.random_range(0..=MAX_MILEAGE);
    let fuel_type = pick(FUEL_TYPES, rng);
    let transmission = pick(TRANSMISSIONS, rng);
    let country = PLATE_FORMATS
        .choose(rng)
        .map_or("Unknown", |(name, _)| *name);

    let vin: String = (0..VIN_LENGTH)
        .map(|_| VIN_CHARS[rng.random_range(0..VIN_CHARS.len())] as char)
        .collect();
    let registration_date = registration_date(year, rng);
    let number_plate = number_plate(country, rng);
    let previous_owners = previous_owners(year, mileage, rng);

    CarAttributes {
        year,
        mileage,
        fuel_type: fuel_type.to_string(),
        transmission: transmission.to_string(),
        vin,
        registration_date,
        country: country.to_string(),
        number_plate,
        previous_owners,
    }
}

/// Plate for a country, falling back to a generic layout for unknown ones.
pub fn number_plate<R: Rng + ?Sized>(country: &str, rng: &mut R) -> String {
    let format = PLATE_FORMATS
        .iter()
        .find(|(name, _)| *name == country)
        .map_or(GENERIC_PLATE, |(_, format)| *format);
    render_plate(format, rng)
}

fn render_plate<R: Rng + ?Sized>(format: &[PlateToken], rng: &mut R) -> String {
    let mut plate = String::new();
    for token in format {
        match token {
            Pick(options) => plate.push_str(pick(options, rng)),
            Number(lo, hi) => plate.push_str(&rng.random_range(*lo..=*hi).to_string()),
            Lit(text) => plate.push_str(text),
        }
    }
    plate
}

fn pick<R: Rng + ?Sized>(options: &[&'static str], rng: &mut R) -> &'static str {
    options.choose(rng).copied().unwrap_or_default()
}

fn registration_date<R: Rng + ?Sized>(year: u16, rng: &mut R) -> String {
    let registration_year = rng.random_range(year..=CURRENT_YEAR);
    let month = rng.random_range(1..=12u8);
    let day = rng.random_range(1..=days_in_month(registration_year, month));
    format!("{}-{:02}-{:02}", registration_year, month, day)
}

/// Month length with the simple divisible-by-four leap rule.
pub fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        2 if year % 4 == 0 => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Mean of the age factor and mileage factor, each capped at 1.
pub fn wear_factor(year: u16, mileage: u32) -> f64 {
    let age = f64::from(CURRENT_YEAR.saturating_sub(year));
    let age_factor = (age / 10.0).min(1.0);
    let mileage_factor = (f64::from(mileage) / f64::from(MAX_MILEAGE)).min(1.0);
    (age_factor + mileage_factor) / 2.0
}

fn previous_owners<R: Rng + ?Sized>(year: u16, mileage: u32, rng: &mut R) -> u8 {
    let wear = wear_factor(year, mileage);
    let (_, owners, weights) = OWNER_BANDS
        .iter()
        .find(|(upper, _, _)| wear < *upper)
        .copied()
        .unwrap_or(OWNER_BANDS[OWNER_BANDS.len() - 1]);
    match WeightedIndex::new(weights) {
        Ok(distribution) => owners[distribution.sample(rng)],
        Err(_) => owners[0],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_deterministic_per_seed() {
        assert_eq!(generate_cars_seeded(20, 42), generate_cars_seeded(20, 42));
        assert_ne!(generate_cars_seeded(20, 42), generate_cars_seeded(20, 43));
    }

    #[test]
    fn attributes_stay_in_range() {
        let countries: Vec<&str> = countries().collect();
        for car in generate_cars_seeded(500, 7) {
            assert!((FIRST_YEAR..=CURRENT_YEAR).contains(&car.year));
            assert!(car.mileage <= MAX_MILEAGE);
            assert!(FUEL_TYPES.contains(&car.fuel_type.as_str()));
            assert!(TRANSMISSIONS.contains(&car.transmission.as_str()));
            assert!(countries.contains(&car.country.as_str()));
            assert_eq!(car.vin.len(), VIN_LENGTH);
            assert!(car.vin.bytes().all(|b| VIN_CHARS.contains(&b)));
            assert!(car.previous_owners <= 6);
            assert!(!car.number_plate.is_empty());

            let parts: Vec<u16> = car
                .registration_date
                .split('-')
                .map(|p| p.parse().unwrap())
                .collect();
            assert!(parts[0] >= car.year && parts[0] <= CURRENT_YEAR);
            assert!((1..=12).contains(&parts[1]));
            assert!(parts[2] >= 1 && parts[2] <= u16::from(days_in_month(parts[0], parts[1] as u8)));
        }
    }

    #[test]
    fn there_are_fifty_four_countries() {
        assert_eq!(countries().count(), 54);
    }

    #[test]
    fn leap_years_use_divisible_by_four() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2000, 2), 29);
        assert_eq!(days_in_month(2021, 11), 30);
    }

    #[test]
    fn new_low_mileage_cars_have_few_owners() {
        assert!(wear_factor(CURRENT_YEAR, 0) < 0.2);
        assert!(wear_factor(FIRST_YEAR, MAX_MILEAGE) >= 0.8);

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..200 {
            assert!(previous_owners(CURRENT_YEAR, 1_000, &mut rng) <= 1);
            assert!(previous_owners(FIRST_YEAR, MAX_MILEAGE, &mut rng) >= 2);
        }
    }

    #[test]
    fn plates_follow_country_layout() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let dutch = number_plate("Netherlands", &mut rng);
        assert_eq!(dutch.matches('-').count(), 2);

        let egyptian = number_plate("Egypt", &mut rng);
        assert_eq!(egyptian.len(), 5);
        assert!(egyptian.chars().all(|c| c.is_ascii_digit()));

        let generic = number_plate("Atlantis", &mut rng);
        assert_eq!(generic.len(), 6);
    }
}

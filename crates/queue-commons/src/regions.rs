//! Region codec (C1): maps between the `Region` enum, its stable numeric
//! forms, and the bitmask `region_code` used to pack a subset of regions
//! into a single integer.

use serde::{Deserialize, Serialize};

/// The six satellite regions, in their stable wire order.
///
/// `region_number` is `Region as u8` (0..=5), the form used on the wire in
/// HTTP requests. `region_id` is `region_number + 1`, the form persisted in
/// the database — kept distinct for backward compatibility with a
/// previous implementation that started ids at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Region {
    G18 = 0,
    E113 = 1,
    T11nAfr = 2,
    T11nEu = 3,
    T18vC = 4,
    T18vKu = 5,
}

pub const ALL_REGIONS: [Region; 6] = [
    Region::G18,
    Region::E113,
    Region::T11nAfr,
    Region::T11nEu,
    Region::T18vC,
    Region::T18vKu,
];

/// `REGION_MASK_ALL_REGIONS = 2^6 - 1`.
pub const REGION_MASK_ALL_REGIONS: u32 = (1 << ALL_REGIONS.len()) - 1;

impl Region {
    pub fn region_number(self) -> u8 {
        self as u8
    }

    pub fn region_id(self) -> i32 {
        self.region_number() as i32 + 1
    }

    pub fn from_region_number(n: u8) -> Option<Region> {
        ALL_REGIONS.into_iter().find(|r| r.region_number() == n)
    }

    pub fn from_region_id(id: i32) -> Option<Region> {
        ALL_REGIONS.into_iter().find(|r| r.region_id() == id)
    }

    /// Regions without a receiving station never produce a real Rx
    /// confirmation; the engine synthesizes a `presumed` one for them.
    pub fn has_receiver(self) -> bool {
        !matches!(self, Region::T11nAfr | Region::T11nEu)
    }

    pub fn satellite_name(self) -> &'static str {
        match self {
            Region::G18 => "Galaxy 18",
            Region::E113 => "Eutelsat 113",
            Region::T11nAfr | Region::T11nEu => "Telstar 11N",
            Region::T18vC => "Telstar 18V C",
            Region::T18vKu => "Telstar 18V Ku",
        }
    }

    pub fn coverage(self) -> &'static str {
        match self {
            Region::G18 => "North America",
            Region::E113 => "South America",
            Region::T11nAfr => "Africa",
            Region::T11nEu => "Europe",
            Region::T18vC | Region::T18vKu => "Asia Pacific",
        }
    }
}

/// Ids of regions monitored for Rx confirmations (`has_receiver() == true`).
pub fn monitored_rx_region_ids() -> Vec<i32> {
    ALL_REGIONS
        .into_iter()
        .filter(|r| r.has_receiver())
        .map(Region::region_id)
        .collect()
}

/// Pack a set of region numbers into a `region_code` bitmask.
pub fn region_numbers_to_code(numbers: &[u8]) -> u32 {
    numbers.iter().fold(0u32, |acc, &n| acc | (1 << n))
}

pub fn region_ids_to_code(ids: &[i32]) -> u32 {
    let numbers: Vec<u8> = ids
        .iter()
        .filter_map(|&id| Region::from_region_id(id).map(Region::region_number))
        .collect();
    region_numbers_to_code(&numbers)
}

/// Decode a `region_code` into the list of region numbers it represents.
///
/// A code of 0 is defined as "all regions" — this convention must be
/// preserved by every encoder.
pub fn code_to_region_numbers(code: u32) -> Vec<u8> {
    if code == 0 {
        return ALL_REGIONS.iter().map(|r| r.region_number()).collect();
    }
    ALL_REGIONS
        .into_iter()
        .filter(|r| code & (1 << r.region_number()) != 0)
        .map(Region::region_number)
        .collect()
}

pub fn code_to_region_ids(code: u32) -> Vec<i32> {
    code_to_region_numbers(code)
        .into_iter()
        .filter_map(Region::from_region_number)
        .map(Region::region_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn decode_zero_means_all_regions() {
        let ids: HashSet<_> = code_to_region_ids(0).into_iter().collect();
        let all: HashSet<_> = ALL_REGIONS.iter().map(|r| r.region_id()).collect();
        assert_eq!(ids, all);
    }

    #[test]
    fn round_trips_arbitrary_subsets() {
        for code in 1..=REGION_MASK_ALL_REGIONS {
            let ids = code_to_region_ids(code);
            let re_encoded = region_ids_to_code(&ids);
            assert_eq!(re_encoded, code);
        }
    }

    #[test]
    fn region_id_is_region_number_plus_one() {
        for region in ALL_REGIONS {
            assert_eq!(region.region_id(), region.region_number() as i32 + 1);
        }
    }

    #[test]
    fn only_two_regions_lack_a_receiver() {
        let without_receiver: Vec<_> = ALL_REGIONS
            .into_iter()
            .filter(|r| !r.has_receiver())
            .collect();
        assert_eq!(without_receiver, vec![Region::T11nAfr, Region::T11nEu]);
    }
}

//! Query windows for the catalog.
//!
//! The area of interest (Pacific rim plus the Alpide belt) straddles the
//! antimeridian, which a single min/max longitude box cannot express. It is
//! split into two boxes that each stay inside [-180, 180].

/// Rectangular latitude/longitude window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingRegion {
    pub label: &'static str,
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

/// Asia-Pacific and the Alpide belt, from the Atlantic east to the antimeridian.
pub const PACIFIC_WEST: BoundingRegion = BoundingRegion {
    label: "pacific-west",
    min_latitude: -70.0,
    max_latitude: 75.0,
    min_longitude: -25.0,
    max_longitude: 180.0,
};

/// The Americas side of the Pacific, from the antimeridian to the Atlantic.
pub const PACIFIC_EAST: BoundingRegion = BoundingRegion {
    label: "pacific-east",
    min_latitude: -70.0,
    max_latitude: 75.0,
    min_longitude: -180.0,
    max_longitude: -30.0,
};

pub const DEFAULT_REGIONS: [BoundingRegion; 2] = [PACIFIC_WEST, PACIFIC_EAST];

impl BoundingRegion {
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&latitude)
            && (self.min_longitude..=self.max_longitude).contains(&longitude)
    }

    /// Closed-interval overlap on both axes.
    pub fn overlaps(&self, other: &BoundingRegion) -> bool {
        self.min_latitude <= other.max_latitude
            && other.min_latitude <= self.max_latitude
            && self.min_longitude <= other.max_longitude
            && other.min_longitude <= self.max_longitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_regions_are_disjoint() {
        assert!(!PACIFIC_WEST.overlaps(&PACIFIC_EAST));
        assert!(!PACIFIC_EAST.overlaps(&PACIFIC_WEST));
    }

    #[test]
    fn default_regions_cover_both_belts() {
        // Tokyo, Santiago, Tehran
        assert!(PACIFIC_WEST.contains(35.7, 139.7));
        assert!(PACIFIC_EAST.contains(-33.4, -70.6));
        assert!(PACIFIC_WEST.contains(35.7, 51.4));
    }

    #[test]
    fn touching_boxes_overlap() {
        let a = BoundingRegion { max_longitude: 10.0, ..PACIFIC_WEST };
        let b = BoundingRegion { min_longitude: 10.0, max_longitude: 20.0, ..PACIFIC_WEST };
        assert!(a.overlaps(&b));
    }
}

//! Launch-pad catalog and hazard geometry with nearest-hazard lookup.
//!
//! The index is built once from a reference file and is read-only afterwards, so one
//! instance can be shared across feature derivation runs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::constants::{DEFAULT_MAX_LOOKUP_DISTANCE_M, EARTH_RADIUS_M};
use crate::domain::GeoPoint;
use crate::error::{ReconError, Result};
use crate::pipeline::processing::similarity::normalize_name;

/// Great-circle distance in meters
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (b.longitude - a.longitude).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PadSite {
    pub name: String,
    pub aliases: Vec<String>,
    pub location: GeoPoint,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HazardGeometry {
    Point(GeoPoint),
    /// Closed ring; the last vertex connects back to the first
    Polygon(Vec<GeoPoint>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hazard {
    pub name: String,
    /// railway, highway, coastline, ...
    pub kind: Option<String>,
    pub geometry: HazardGeometry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestHazard {
    pub name: String,
    pub kind: Option<String>,
    pub distance_m: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HazardLookup {
    Hit(NearestHazard),
    /// Nothing indexed, or the nearest hazard is farther than the lookup limit
    Miss { reason: String },
}

impl HazardLookup {
    pub fn hit(&self) -> Option<&NearestHazard> {
        match self {
            Self::Hit(h) => Some(h),
            Self::Miss { .. } => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReferenceFile {
    #[serde(default)]
    pads: Vec<PadEntry>,
    #[serde(default)]
    hazards: Vec<HazardEntry>,
}

#[derive(Debug, Deserialize)]
struct PadEntry {
    name: String,
    #[serde(default)]
    aliases: Vec<String>,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct HazardEntry {
    name: String,
    kind: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    /// [latitude, longitude] vertices
    polygon: Option<Vec<[f64; 2]>>,
}

impl HazardEntry {
    fn into_hazard(self) -> Result<Hazard> {
        let geometry = match (self.latitude, self.longitude, self.polygon) {
            (Some(lat), Some(lon), None) => HazardGeometry::Point(GeoPoint::new(lat, lon)),
            (None, None, Some(ring)) => {
                if ring.len() < 3 {
                    return Err(ReconError::Config(format!(
                        "hazard '{}': polygon needs at least 3 vertices",
                        self.name
                    )));
                }
                HazardGeometry::Polygon(ring.into_iter().map(|[lat, lon]| GeoPoint::new(lat, lon)).collect())
            }
            _ => {
                return Err(ReconError::Config(format!(
                    "hazard '{}': give either latitude/longitude or polygon",
                    self.name
                )))
            }
        };
        let points: Vec<GeoPoint> = match &geometry {
            HazardGeometry::Point(p) => vec![*p],
            HazardGeometry::Polygon(ring) => ring.clone(),
        };
        if let Some(bad) = points.iter().find(|p| !p.is_valid()) {
            return Err(ReconError::Config(format!(
                "hazard '{}': invalid coordinate ({}, {})",
                self.name, bad.latitude, bad.longitude
            )));
        }
        Ok(Hazard {
            name: self.name,
            kind: self.kind.map(|k| k.trim().to_lowercase()).filter(|k| !k.is_empty()),
            geometry,
        })
    }
}

/// Read-only spatial index over pads and hazards
#[derive(Debug, Clone)]
pub struct ProximityIndex {
    pads: Vec<PadSite>,
    hazards: Vec<Hazard>,
    max_lookup_distance_m: f64,
    /// normalized pad name or alias -> index into `pads`
    pad_names: HashMap<String, usize>,
    /// nearest hazard per pad, computed at build time
    pad_nearest: Vec<HazardLookup>,
    /// nearest hazard of each kind per pad, computed at build time
    pad_nearest_by_kind: Vec<BTreeMap<String, NearestHazard>>,
}

impl Default for ProximityIndex {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new(), DEFAULT_MAX_LOOKUP_DISTANCE_M)
    }
}

impl ProximityIndex {
    pub fn new(pads: Vec<PadSite>, hazards: Vec<Hazard>, max_lookup_distance_m: f64) -> Self {
        let mut index = Self {
            pads,
            hazards,
            max_lookup_distance_m,
            pad_names: HashMap::new(),
            pad_nearest: Vec::new(),
            pad_nearest_by_kind: Vec::new(),
        };
        for (i, pad) in index.pads.iter().enumerate() {
            for name in std::iter::once(&pad.name).chain(pad.aliases.iter()) {
                index.pad_names.entry(normalize_name(name)).or_insert(i);
            }
        }
        index.pad_nearest = index.pads.iter().map(|p| index.nearest_hazard(p.location)).collect();
        index.pad_nearest_by_kind = index.pads.iter().map(|p| index.nearest_by_kind(p.location)).collect();
        index
    }

    pub fn from_reference_toml(input: &str, max_lookup_distance_m: f64) -> Result<Self> {
        let file: ReferenceFile = toml::from_str(input)?;
        let mut pads = Vec::with_capacity(file.pads.len());
        for entry in file.pads {
            let location = GeoPoint::new(entry.latitude, entry.longitude);
            if !location.is_valid() {
                return Err(ReconError::Config(format!("pad '{}': invalid coordinate", entry.name)));
            }
            pads.push(PadSite {
                name: entry.name,
                aliases: entry.aliases,
                location,
            });
        }
        let hazards = file
            .hazards
            .into_iter()
            .map(HazardEntry::into_hazard)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(pads, hazards, max_lookup_distance_m))
    }

    pub fn load(path: &Path, max_lookup_distance_m: f64) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ReconError::Config(format!("Failed to read reference file '{}': {}", path.display(), e))
        })?;
        let index = Self::from_reference_toml(&content, max_lookup_distance_m)?;
        info!(
            pads = index.pads.len(),
            hazards = index.hazards.len(),
            "Loaded proximity reference from {}",
            path.display()
        );
        Ok(index)
    }

    pub fn pads(&self) -> &[PadSite] {
        &self.pads
    }

    pub fn hazard_count(&self) -> usize {
        self.hazards.len()
    }

    pub fn max_lookup_distance_m(&self) -> f64 {
        self.max_lookup_distance_m
    }

    /// Catalog coordinates for a pad name or alias
    pub fn pad_coordinates(&self, name: &str) -> Option<GeoPoint> {
        self.pad_names.get(&normalize_name(name)).map(|&i| self.pads[i].location)
    }

    /// Nearest hazard for a catalog pad, from the build-time table
    pub fn pad_hazard(&self, name: &str) -> Option<&HazardLookup> {
        self.pad_names.get(&normalize_name(name)).map(|&i| &self.pad_nearest[i])
    }

    /// Per-kind table for a catalog pad, from the build-time table
    pub fn pad_hazards_by_kind(&self, name: &str) -> Option<&BTreeMap<String, NearestHazard>> {
        self.pad_names
            .get(&normalize_name(name))
            .map(|&i| &self.pad_nearest_by_kind[i])
    }

    /// Nearest hazard of every kind within the lookup limit. Kinds with nothing in range are
    /// absent; hazards without a kind only count towards `nearest_hazard`.
    pub fn nearest_by_kind(&self, point: GeoPoint) -> BTreeMap<String, NearestHazard> {
        let mut nearest: BTreeMap<String, NearestHazard> = BTreeMap::new();
        for hazard in &self.hazards {
            let Some(kind) = hazard.kind.as_deref() else { continue };
            let d = distance_to(point, &hazard.geometry);
            if d > self.max_lookup_distance_m {
                continue;
            }
            match nearest.get(kind) {
                Some(best) if best.distance_m <= d => {}
                _ => {
                    nearest.insert(
                        kind.to_string(),
                        NearestHazard {
                            name: hazard.name.clone(),
                            kind: hazard.kind.clone(),
                            distance_m: d,
                        },
                    );
                }
            }
        }
        nearest
    }

    pub fn nearest_hazard(&self, point: GeoPoint) -> HazardLookup {
        if self.hazards.is_empty() {
            return HazardLookup::Miss {
                reason: "no hazards indexed".to_string(),
            };
        }
        let mut best: Option<(f64, &Hazard)> = None;
        for hazard in &self.hazards {
            let d = distance_to(point, &hazard.geometry);
            // first listed wins ties
            if best.map_or(true, |(bd, _)| d < bd) {
                best = Some((d, hazard));
            }
        }
        match best {
            Some((d, hazard)) if d <= self.max_lookup_distance_m => HazardLookup::Hit(NearestHazard {
                name: hazard.name.clone(),
                kind: hazard.kind.clone(),
                distance_m: d,
            }),
            Some((d, hazard)) => {
                debug!("Nearest hazard '{}' is {:.0} m away, beyond lookup limit", hazard.name, d);
                HazardLookup::Miss {
                    reason: format!(
                        "nearest hazard '{}' is {:.0} m away, limit {:.0} m",
                        hazard.name, d, self.max_lookup_distance_m
                    ),
                }
            }
            None => HazardLookup::Miss {
                reason: "no hazards indexed".to_string(),
            },
        }
    }
}

fn distance_to(point: GeoPoint, geometry: &HazardGeometry) -> f64 {
    match geometry {
        HazardGeometry::Point(p) => haversine_m(point, *p),
        HazardGeometry::Polygon(ring) => {
            if polygon_contains(ring, point) {
                return 0.0;
            }
            (0..ring.len())
                .map(|i| segment_distance_m(point, ring[i], ring[(i + 1) % ring.len()]))
                .fold(f64::INFINITY, f64::min)
        }
    }
}

/// Even-odd ray casting in the lat/lon plane
fn polygon_contains(ring: &[GeoPoint], point: GeoPoint) -> bool {
    let (x, y) = (point.longitude, point.latitude);
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = (ring[i].longitude, ring[i].latitude);
        let (xj, yj) = (ring[j].longitude, ring[j].latitude);
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Point-to-segment distance on a local equirectangular projection centred on `point`.
/// Accurate to well under a percent at the distances the lookup limit allows.
fn segment_distance_m(point: GeoPoint, a: GeoPoint, b: GeoPoint) -> f64 {
    let cos_lat = point.latitude.to_radians().cos();
    let project = |p: GeoPoint| {
        let mut dlon = p.longitude - point.longitude;
        if dlon > 180.0 {
            dlon -= 360.0;
        } else if dlon < -180.0 {
            dlon += 360.0;
        }
        (
            EARTH_RADIUS_M * dlon.to_radians() * cos_lat,
            EARTH_RADIUS_M * (p.latitude - point.latitude).to_radians(),
        )
    };
    let (ax, ay) = project(a);
    let (bx, by) = project(b);
    let (dx, dy) = (bx - ax, by - ay);
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (-(ax * dx + ay * dy) / len2).clamp(0.0, 1.0)
    };
    let (cx, cy) = (ax + t * dx, ay + t * dy);
    (cx * cx + cy * cy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE: &str = r#"
[[pads]]
name = "CCSFS SLC 40"
aliases = ["CCAFS SLC-40", "Cape Canaveral SLC-40"]
latitude = 28.5619
longitude = -80.5774

[[pads]]
name = "VAFB SLC 4E"
latitude = 34.6321
longitude = -120.6106

[[hazards]]
name = "US-1"
kind = "highway"
latitude = 28.5619
longitude = -80.6090

[[hazards]]
name = "Restricted zone"
kind = "exclusion"
polygon = [[28.40, -80.70], [28.40, -80.50], [28.50, -80.50], [28.50, -80.70]]
"#;

    #[test]
    fn test_haversine_known_distance() {
        // one degree of latitude
        let d = haversine_m(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0));
        assert!((d - 111_195.0).abs() < 10.0, "got {d}");
        assert_eq!(haversine_m(GeoPoint::new(28.5, -80.6), GeoPoint::new(28.5, -80.6)), 0.0);
    }

    #[test]
    fn test_pad_lookup_by_alias() {
        let index = ProximityIndex::from_reference_toml(REFERENCE, 250_000.0).unwrap();
        assert_eq!(index.pads().len(), 2);
        assert_eq!(index.pad_coordinates("ccafs slc 40"), Some(GeoPoint::new(28.5619, -80.5774)));
        assert!(index.pad_coordinates("Boca Chica").is_none());
    }

    #[test]
    fn test_nearest_point_hazard() {
        let index = ProximityIndex::from_reference_toml(REFERENCE, 250_000.0).unwrap();
        let hit = index.pad_hazard("CCSFS SLC 40").unwrap().hit().cloned().unwrap();
        assert_eq!(hit.name, "US-1");
        // ~0.0316 degrees of longitude at 28.56N
        assert!((hit.distance_m - 3_090.0).abs() < 50.0, "got {}", hit.distance_m);
    }

    #[test]
    fn test_polygon_inside_is_zero() {
        let index = ProximityIndex::from_reference_toml(REFERENCE, 250_000.0).unwrap();
        let hit = index.nearest_hazard(GeoPoint::new(28.45, -80.60));
        let hit = hit.hit().unwrap();
        assert_eq!(hit.name, "Restricted zone");
        assert_eq!(hit.distance_m, 0.0);
    }

    #[test]
    fn test_polygon_edge_distance() {
        let ring = vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 1.0),
            GeoPoint::new(1.0, 1.0),
            GeoPoint::new(1.0, 0.0),
        ];
        let d = distance_to(GeoPoint::new(-0.1, 0.5), &HazardGeometry::Polygon(ring));
        assert!((d - 11_119.5).abs() < 20.0, "got {d}");
    }

    #[test]
    fn test_far_pad_is_a_miss() {
        let index = ProximityIndex::from_reference_toml(REFERENCE, 250_000.0).unwrap();
        match index.pad_hazard("VAFB SLC 4E").unwrap() {
            HazardLookup::Miss { reason } => assert!(reason.contains("limit")),
            other => panic!("expected miss, got {other:?}"),
        }
    }

    #[test]
    fn test_nearest_by_kind_keeps_one_per_kind() {
        let reference = format!(
            "{REFERENCE}\n[[hazards]]\nname = \"Banana River\"\nkind = \"Coastline\"\nlatitude = 28.5619\nlongitude = -80.6500\n\n[[hazards]]\nname = \"FEC Railway\"\nkind = \"railway\"\nlatitude = 28.5619\nlongitude = -80.8000\n\n[[hazards]]\nname = \"Unlabelled\"\nlatitude = 28.5619\nlongitude = -80.5775\n"
        );
        let index = ProximityIndex::from_reference_toml(&reference, 250_000.0).unwrap();
        let point = GeoPoint::new(28.5619, -80.5774);
        let by_kind = index.nearest_by_kind(point);

        assert_eq!(by_kind.len(), 4);
        assert_eq!(by_kind["highway"].name, "US-1");
        assert_eq!(by_kind["coastline"].name, "Banana River");
        assert_eq!(by_kind["railway"].name, "FEC Railway");
        assert!(by_kind["railway"].distance_m > by_kind["coastline"].distance_m);
        assert!(by_kind.values().all(|h| h.name != "Unlabelled"));

        // the unlabelled hazard still wins the overall lookup
        assert_eq!(index.nearest_hazard(point).hit().unwrap().name, "Unlabelled");
        assert_eq!(index.pad_hazards_by_kind("CCAFS SLC-40"), Some(&by_kind));
    }

    #[test]
    fn test_nearest_by_kind_respects_limit() {
        let index = ProximityIndex::from_reference_toml(REFERENCE, 5_000.0).unwrap();
        let by_kind = index.pad_hazards_by_kind("CCSFS SLC 40").unwrap();
        assert_eq!(by_kind.keys().collect::<Vec<_>>(), vec!["highway"]);
        assert!(index.pad_hazards_by_kind("VAFB SLC 4E").unwrap().is_empty());
    }

    #[test]
    fn test_empty_index_misses() {
        let index = ProximityIndex::default();
        assert!(index.nearest_hazard(GeoPoint::new(28.5, -80.6)).hit().is_none());
    }

    #[test]
    fn test_reject_invalid_geometry() {
        let bad = "[[hazards]]\nname = \"x\"\nlatitude = 95.0\nlongitude = 0.0\n";
        assert!(ProximityIndex::from_reference_toml(bad, 1000.0).is_err());
        let both = "[[hazards]]\nname = \"x\"\nlatitude = 1.0\nlongitude = 0.0\npolygon = [[0.0,0.0],[0.0,1.0],[1.0,1.0]]\n";
        assert!(ProximityIndex::from_reference_toml(both, 1000.0).is_err());
    }
}

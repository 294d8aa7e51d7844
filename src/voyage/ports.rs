use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::geo::haversine_km;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Port {
    pub name: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
}

/// Port reference data, loaded from a headerless `name,country,lat,lon` CSV.
#[derive(Debug, Clone, Default)]
pub struct PortCatalog {
    ports: Vec<Port>,
}

impl PortCatalog {
    pub fn new(ports: Vec<Port>) -> Self {
        Self { ports }
    }

    /// Loads a catalog file. A missing file is an empty catalog; short rows
    /// and rows with unparsable coordinates (including a header row) are skipped.
    pub fn load_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(Error::io(path, err)),
        };
        Ok(Self::from_reader(file))
    }

    pub fn from_reader<R: Read>(reader: R) -> Self {
        let mut csv = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let mut ports = Vec::new();
        for record in csv.records() {
            let Ok(record) = record else {
                continue;
            };
            if record.len() < 4 {
                continue;
            }
            let (Ok(lat), Ok(lon)) = (record[2].parse::<f64>(), record[3].parse::<f64>()) else {
                continue;
            };
            ports.push(Port {
                name: record[0].to_string(),
                country: record[1].to_string(),
                lat,
                lon,
            });
        }
        Self { ports }
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Ports inside an inclusive lat/lon box, in catalog order.
    pub fn within(&self, min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64, limit: usize) -> Vec<&Port> {
        self.ports
            .iter()
            .filter(|p| (min_lat..=max_lat).contains(&p.lat) && (min_lon..=max_lon).contains(&p.lon))
            .take(limit)
            .collect()
    }

    /// Index of and distance to the nearest port.
    pub fn nearest(&self, lat: f64, lon: f64) -> Option<(usize, f64)> {
        self.ports
            .iter()
            .enumerate()
            .map(|(idx, p)| (idx, haversine_km(lat, lon, p.lat, p.lon)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    pub fn get(&self, idx: usize) -> Option<&Port> {
        self.ports.get(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "name,country,lat,lon\n\
        Miami,US,25.7781,-80.1794\n\
        Nassau , BS , 25.0781 , -77.3431\n\
        Broken,XX\n\
        Cozumel,MX,not-a-number,-86.95\n\
        Port Canaveral,US,28.4101,-80.6188\n";

    #[test]
    fn skips_header_and_bad_rows() {
        let catalog = PortCatalog::from_reader(CSV.as_bytes());
        let names: Vec<&str> = catalog.ports().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Miami", "Nassau", "Port Canaveral"]);
        assert_eq!(catalog.ports()[1].country, "BS");
    }

    #[test]
    fn bbox_and_nearest() {
        let catalog = PortCatalog::from_reader(CSV.as_bytes());
        let florida = catalog.within(24.0, -82.0, 29.0, -79.0, 10);
        assert_eq!(florida.len(), 2);
        assert_eq!(catalog.within(24.0, -82.0, 29.0, -79.0, 1).len(), 1);

        let (idx, km) = catalog.nearest(25.77, -80.17).expect("nearest");
        assert_eq!(catalog.get(idx).map(|p| p.name.as_str()), Some("Miami"));
        assert!(km < 2.0);
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let catalog = PortCatalog::load_csv(dir.path().join("ports.csv")).expect("load");
        assert!(catalog.is_empty());
        assert!(catalog.nearest(0.0, 0.0).is_none());
    }
}

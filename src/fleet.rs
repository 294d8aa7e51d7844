//! Fleet membership table and AIS name normalization.
//!
//! The table is plain data: fleet line → set of exact AIS names. A built-in
//! table covers the tracked cruise fleets; deployments can replace it with a
//! JSON file of the same shape:
//!
//! ```json
//! { "royal": ["ICON OF THE SEAS", "WONDER OF THE SEAS"], "virgin": ["SCARLET LADY"] }
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::FleetLine;

const BUILTIN: &[(FleetLine, &[&str])] = &[
    (
        FleetLine::Royal,
        &[
            "ICON OF THE SEAS",
            "STAR OF THE SEAS",
            "UTOPIA OF THE SEAS",
            "WONDER OF THE SEAS",
            "SYMPHONY OF THE SEAS",
            "HARMONY OF THE SEAS",
            "OASIS OF THE SEAS",
            "ALLURE OF THE SEAS",
            "ODYSSEY OF THE SEAS",
            "SPECTRUM OF THE SEAS",
            "QUANTUM OF THE SEAS",
            "OVATION OF THE SEAS",
            "ANTHEM OF THE SEAS",
            "FREEDOM OF THE SEAS",
            "LIBERTY OF THE SEAS",
            "INDEPENDENCE OF THE SEAS",
            "VOYAGER OF THE SEAS",
            "EXPLORER OF THE SEAS",
            "ADVENTURE OF THE SEAS",
            "NAVIGATOR OF THE SEAS",
            "MARINER OF THE SEAS",
            "RADIANCE OF THE SEAS",
            "BRILLIANCE OF THE SEAS",
            "JEWEL OF THE SEAS",
            "SERENADE OF THE SEAS",
            "VISION OF THE SEAS",
            "GRANDEUR OF THE SEAS",
            "RHAPSODY OF THE SEAS",
            "ENCHANTMENT OF THE SEAS",
        ],
    ),
    (
        FleetLine::Carnival,
        &[
            "CARNIVAL BREEZE",
            "CARNIVAL CELEBRATION",
            "CARNIVAL DREAM",
            "CARNIVAL FANTASY",
            "CARNIVAL HORIZON",
            "CARNIVAL LEGEND",
            "CARNIVAL MAGIC",
            "CARNIVAL MIRACLE",
            "CARNIVAL PRIDE",
            "CARNIVAL SPIRIT",
            "CARNIVAL SUNSHINE",
            "CARNIVAL TRIUMPH",
            "CARNIVAL VISTA",
            "CARNIVAL JUBILEE",
            "MARDI GRAS",
            "CARNIVAL PANORAMA",
            "CARNIVAL CONQUEST",
            "CARNIVAL GLORY",
            "CARNIVAL VALOR",
            "CARNIVAL ELATION",
            "CARNIVAL PARADISE",
            "CARNIVAL RADIANCE",
            "CARNIVAL FREEDOM",
            "CARNIVAL SPLENDOR",
            "CARNIVAL LUMINOSA",
            "CARNIVAL FIRENZE",
        ],
    ),
    (
        FleetLine::Ncl,
        &[
            "NORWEGIAN BLISS",
            "NORWEGIAN BREAKAWAY",
            "NORWEGIAN DAWN",
            "NORWEGIAN ENCORE",
            "NORWEGIAN ESCAPE",
            "NORWEGIAN GEM",
            "NORWEGIAN GETAWAY",
            "NORWEGIAN JADE",
            "NORWEGIAN JOY",
            "NORWEGIAN PEARL",
            "NORWEGIAN PRIMA",
            "NORWEGIAN SUN",
            "NORWEGIAN SPIRIT",
            "NORWEGIAN STAR",
            "NORWEGIAN VIVA",
            "PRIDE OF AMERICA",
            "NORWEGIAN EPIC",
        ],
    ),
    (
        FleetLine::Msc,
        &[
            "MSC FANTASIA",
            "MSC SPLENDIDA",
            "MSC DIVINA",
            "MSC PREZIOSA",
            "MSC SEASIDE",
            "MSC SEAVIEW",
            "MSC SEASHORE",
            "MSC SEASCAPE",
            "MSC GRANDIOSA",
            "MSC EURIBIA",
            "MSC VIRTUOSA",
            "MSC WORLD EUROPA",
            "MSC WORLD AMERICA",
            "MSC ORCHESTRA",
            "MSC POESIA",
            "MSC MAGNIFICA",
            "MSC LIRICA",
            "MSC MUSICA",
            "MSC OPERA",
            "MSC ARMONIA",
            "MSC MERAVIGLIA",
            "MSC BELLISSIMA",
        ],
    ),
    (
        FleetLine::Virgin,
        &["SCARLET LADY", "VALIANT LADY", "RESILIENT LADY", "BRILLIANT LADY"],
    ),
    (
        FleetLine::Disney,
        &[
            "DISNEY MAGIC",
            "DISNEY WONDER",
            "DISNEY DREAM",
            "DISNEY FANTASY",
            "DISNEY WISH",
            "DISNEY TREASURE",
            "DISNEY DESTINY",
            "DISNEY ADVENTURE",
        ],
    ),
];

/// Uppercases, replaces control characters (AIS pads names with NUL) with
/// spaces and collapses runs of whitespace.
pub fn normalize_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    cleaned
        .split_whitespace()
        .map(|word| word.to_uppercase())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Default)]
pub struct FleetTable {
    by_name: HashMap<String, FleetLine>,
}

impl FleetTable {
    pub fn builtin() -> Self {
        let mut table = Self::default();
        for (line, names) in BUILTIN {
            for name in *names {
                table.insert(*line, name);
            }
        }
        table
    }

    /// Loads a table from a JSON object of `line -> [names]`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|err| Error::io(path, err))?;
        let raw: BTreeMap<String, Vec<String>> =
            serde_json::from_slice(&data).map_err(|err| Error::json(path, err))?;
        Self::from_map(raw)
    }

    pub fn from_map(raw: BTreeMap<String, Vec<String>>) -> Result<Self> {
        let mut table = Self::default();
        for (line_key, names) in raw {
            let line: FleetLine = line_key.parse().map_err(Error::FleetTable)?;
            for name in names {
                if let Some(previous) = table.insert(line, &name) {
                    if previous != line {
                        return Err(Error::FleetTable(format!(
                            "{} listed under both {previous} and {line}",
                            normalize_name(&name)
                        )));
                    }
                }
            }
        }
        Ok(table)
    }

    fn insert(&mut self, line: FleetLine, name: &str) -> Option<FleetLine> {
        let name = normalize_name(name);
        if name.is_empty() {
            return None;
        }
        self.by_name.insert(name, line)
    }

    /// Looks up an already normalized name.
    pub fn classify(&self, normalized: &str) -> Option<FleetLine> {
        self.by_name.get(normalized).copied()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn names(&self, line: FleetLine) -> BTreeSet<&str> {
        self.by_name
            .iter()
            .filter(|(_, l)| **l == line)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

use crate::tags::TagSet;
use crate::Result;
use csv::Writer;
use std::collections::{HashMap, HashSet};
use std::io::Write;

const IGNORABLE_KEYS: [&str; 69] = [
    "highway",
    "maxspeed",
    "oneway",
    "lit",
    "surface",
    "frequency",
    "electrified",
    "gauge",
    "lanes",
    "cycleway",
    "voltage",
    "layer",
    "sidewalk",
    "smoothness",
    "postal_code",
    "int_ref",
    "foot",
    "note",
    "source",
    "ref",
    "old_ref",
    "access",
    "tracktype",
    "power",
    "footway",
    "width",
    "fee",
    "junction",
    "wikipedia",
    "admin_level",
    "barrier",
    "wheelchair",
    "boundary",
    "tracks",
    "lcn",
    "start_date",
    "tunnel",
    "network",
    "workrules",
    "detail",
    "route",
    "traffic_sign",
    "wires",
    "psv",
    "hgv",
    "rcn",
    "pzb",
    "level",
    "created_by",
    "cutting",
    "scenic",
    "cables",
    "maxweight",
    "embankment",
    "covered",
    "interval",
    "maxheight",
    "headway",
    "radio",
    "is_in",
    "motor_vehicle",
    "motorcar",
    "operating_procedure",
    "old_name",
    "tilting_technology",
    "loc_ref",
    "combined_transport_codification",
    "wikidata",
    "check_date",
];

const IGNORABLE_PREFIXES: [&str; 18] = [
    "railway:",
    "addr:",
    "cycleway:",
    "source:",
    "note:",
    "power:",
    "seamark:",
    "is_in:",
    "roof:",
    "parking:",
    "lanes:",
    "zone:",
    "wikipedia:",
    "ref:",
    "maxspeed:",
    "turn:",
    "oneway:",
    "name:",
];

const IGNORABLE_TAGS: [(&str, &str); 12] = [
    ("railway", "rail"),
    ("railway", "abandoned"),
    ("usage", "main"),
    ("usage", "branch"),
    ("bicycle", "designated"),
    ("landuse", "industrial"),
    ("type", "route"),
    ("type", "boundary"),
    ("type", "multipolygon"),
    ("type", "associatedStreet"),
    ("building", "industrial"),
    ("service", "driveway"),
];

const YES_NO_KEYS: [&str; 22] = [
    "building",
    "bridge",
    "bicycle",
    "foot",
    "wheelchair",
    "highspeed",
    "tunnel",
    "area",
    "bus",
    "segregated",
    "embankment",
    "train",
    "boat",
    "motorroad",
    "light_rail",
    "horse",
    "noexit",
    "motorcycle",
    "motorcar",
    "motor_vehicle",
    "mofa",
    "winter_service",
];

#[derive(Debug)]
pub struct RestAnalyzer {
    ignorable_tags: HashMap<&'static str, HashSet<&'static str>>,
    counts: HashMap<String, usize>,
}

impl Default for RestAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl RestAnalyzer {
    pub fn new() -> Self {
        let mut ignorable_tags: HashMap<&'static str, HashSet<&'static str>> = HashMap::new();
        for (key, value) in IGNORABLE_TAGS {
            ignorable_tags.entry(key).or_default().insert(value);
        }
        for key in YES_NO_KEYS {
            let values = ignorable_tags.entry(key).or_default();
            values.insert("yes");
            values.insert("no");
        }
        Self {
            ignorable_tags,
            counts: HashMap::new(),
        }
    }

    fn can_tag_be_ignored(&self, key: &str, value: &str) -> bool {
        self.ignorable_tags
            .get(key)
            .map(|values| values.contains(value))
            .unwrap_or(false)
    }

    fn is_ignorable_key(key: &str) -> bool {
        key == "name"
            || IGNORABLE_KEYS.contains(&key)
            || IGNORABLE_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
    }

    pub fn add(&mut self, tags: &TagSet) {
        for (key, value) in tags {
            if Self::is_ignorable_key(key) || self.can_tag_be_ignored(key, value) {
                continue;
            }
            *self.counts.entry(format!("{key}={value}")).or_insert(0) += 1;
        }
    }

    /// Counted tags, most frequent first, ties by tag.
    pub fn histogram(&self) -> Vec<(&str, usize)> {
        let mut entries: Vec<(&str, usize)> = self
            .counts
            .iter()
            .map(|(tag, count)| (tag.as_str(), *count))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }

    pub fn write_csv<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.write_record(["tag", "count"])?;
        for (tag, count) in self.histogram() {
            writer.write_record([tag, count.to_string().as_str()])?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::tags_from_pairs;

    #[test]
    fn skips_ignorable_tags() {
        let mut analyzer = RestAnalyzer::new();
        analyzer.add(&tags_from_pairs([
            ("name", "Molecule Man"),
            ("tourism", "artwork"),
            ("addr:street", "An den Treptowers"),
            ("source", "survey"),
            ("wheelchair", "yes"),
            ("wheelchair:description", "ramp"),
        ]));
        assert_eq!(
            analyzer.histogram(),
            vec![("tourism=artwork", 1), ("wheelchair:description=ramp", 1)]
        );
        assert!(analyzer.can_tag_be_ignored("building", "no"));
        assert!(!analyzer.can_tag_be_ignored("building", "church"));
    }

    #[test]
    fn histogram_orders_by_count_then_tag() {
        let mut analyzer = RestAnalyzer::new();
        assert!(analyzer.histogram().is_empty());
        for tags in [
            tags_from_pairs([("tourism", "artwork")]),
            tags_from_pairs([("historic", "memorial")]),
            tags_from_pairs([("historic", "memorial"), ("memorial", "plaque")]),
        ] {
            analyzer.add(&tags);
        }
        assert_eq!(
            analyzer.histogram(),
            vec![
                ("historic=memorial", 2),
                ("memorial=plaque", 1),
                ("tourism=artwork", 1),
            ]
        );
    }

    #[test]
    fn writes_csv() {
        let mut analyzer = RestAnalyzer::new();
        analyzer.add(&tags_from_pairs([("tourism", "artwork")]));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rest.csv");
        let mut writer = Writer::from_path(&path).unwrap();
        analyzer.write_csv(&mut writer).unwrap();
        drop(writer);
        let data = std::fs::read_to_string(&path).unwrap();
        assert_eq!(data, "tag,count\ntourism=artwork,1\n");
    }
}

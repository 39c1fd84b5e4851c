use crate::category::Category;
use crate::classify::{Classifier, MappingResult};
use crate::names::{simplify, truncate, DEFAULT_NAME_MAX_LENGTH};
use crate::osm::{read_osm, OsmData, WayData};
use crate::rest::RestAnalyzer;
use crate::roads::{group_roads, ElementKind, RoadGroup, RoadSegment, DEFAULT_DISTANCE_M};
use crate::tags::{has_tag, has_value, TagSet};
use crate::Result;
use csv::Writer;
use geo::{Centroid, Contains, Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
use log::{info, warn};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct PoiEntry {
    pub name: Option<String>,
    pub categories: BTreeSet<Arc<Category>>,
    pub lon: f64,
    pub lat: f64,
    pub kind: ElementKind,
    pub id: i64,
}

impl PoiEntry {
    fn new(result: MappingResult, location: Point<f64>, kind: ElementKind, id: i64) -> Self {
        let (name, categories) = result.into_parts();
        Self {
            name,
            categories,
            lon: location.x(),
            lat: location.y(),
            kind,
            id,
        }
    }

    pub fn display_name(&self) -> &str {
        let uses_name = self.categories.iter().any(|category| category.uses_name());
        match &self.name {
            Some(name) if uses_name => name,
            _ => "",
        }
    }

    pub fn identifiers(&self) -> Vec<&str> {
        self.categories
            .iter()
            .map(|category| category.identifier())
            .collect()
    }
}

struct PolygonPoi {
    entry: PoiEntry,
    area: MultiPolygon<f64>,
}

pub struct Gazetteer {
    pub pois: Vec<PoiEntry>,
    pub streets: Vec<RoadGroup>,
    pub rest: RestAnalyzer,
}

#[derive(Copy, Clone, Debug)]
pub struct ExtractOptions {
    pub distance_m: f64,
    pub name_max_length: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            distance_m: DEFAULT_DISTANCE_M,
            name_max_length: DEFAULT_NAME_MAX_LENGTH,
        }
    }
}

pub fn is_street(tags: &TagSet) -> bool {
    tags.contains_key("highway")
}

pub fn build_gazetteer(data: &OsmData, classifier: &Classifier, distance_m: f64) -> Gazetteer {
    let mut rest = RestAnalyzer::new();
    let mut points: Vec<PoiEntry> = Vec::new();
    let mut polygons: Vec<PolygonPoi> = Vec::new();
    let mut segments: Vec<RoadSegment> = Vec::new();

    for node in &data.tagged_nodes {
        let location = Point::new(node.coord.0, node.coord.1);
        for result in classify(classifier, &node.tags, &mut rest) {
            points.push(PoiEntry::new(result, location, ElementKind::Node, node.id));
        }
    }

    for way in &data.ways {
        let Some(coords) = data.way_coords(way) else {
            continue;
        };
        if is_street(&way.tags) {
            if let Some(segment) = road_segment(way, &coords) {
                segments.push(segment);
            }
            continue;
        }
        if !way.is_closed() || coords.len() < 4 {
            continue;
        }
        let area = MultiPolygon::new(vec![Polygon::new(to_line_string(&coords), Vec::new())]);
        add_polygon(
            &mut polygons,
            classifier,
            &mut rest,
            &way.tags,
            area,
            ElementKind::Way,
            way.id,
        );
    }

    for relation in &data.relations {
        let Some(area) = data.multipolygon(relation) else {
            warn!("cannot build area of relation {}", relation.id);
            continue;
        };
        if is_street(&relation.tags) {
            if let Some(name) = street_name(&relation.tags) {
                segments.push(RoadSegment::new(
                    ElementKind::Relation,
                    relation.id,
                    Some(name.to_string()),
                    Geometry::MultiPolygon(area),
                ));
            }
            continue;
        }
        add_polygon(
            &mut polygons,
            classifier,
            &mut rest,
            &relation.tags,
            area,
            ElementKind::Relation,
            relation.id,
        );
    }

    let pois = remove_overlapping_polygons(points, polygons);

    let mut streets = Vec::new();
    for group in group_roads(segments, distance_m) {
        if group.linework().is_none() || group.center().is_none() {
            warn!("no linework available for street {}", group.name());
            continue;
        }
        streets.push(group);
    }

    info!("{} pois, {} streets", pois.len(), streets.len());
    Gazetteer {
        pois,
        streets,
        rest,
    }
}

/// Classify `tags`, leaving out fallback results without a name. Named
/// features that only reach the fallback feed the rest histogram.
fn classify(classifier: &Classifier, tags: &TagSet, rest: &mut RestAnalyzer) -> Vec<MappingResult> {
    let results = classifier.classify(tags);
    let only_fallback =
        !results.is_empty() && results.iter().all(|result| result.is_fallback());
    let specific = ["shop", "leisure", "building"]
        .iter()
        .any(|key| tags.contains_key(*key));
    if only_fallback && !specific && has_tag(tags, "name") {
        rest.add(tags);
    }
    results
        .into_iter()
        .filter(|result| !(result.is_fallback() && result.name().is_none()))
        .collect()
}

fn add_polygon(
    polygons: &mut Vec<PolygonPoi>,
    classifier: &Classifier,
    rest: &mut RestAnalyzer,
    tags: &TagSet,
    area: MultiPolygon<f64>,
    kind: ElementKind,
    id: i64,
) {
    let Some(centroid) = area.centroid() else {
        warn!("empty polygon centroid for {} {id}", kind.as_str());
        return;
    };
    for result in classify(classifier, tags, rest) {
        polygons.push(PolygonPoi {
            entry: PoiEntry::new(result, centroid, kind, id),
            area: area.clone(),
        });
    }
}

fn to_line_string(coords: &[(f64, f64)]) -> LineString<f64> {
    LineString::new(coords.iter().map(|&(x, y)| Coord { x, y }).collect())
}

fn street_name(tags: &TagSet) -> Option<&str> {
    if has_tag(tags, "name") {
        tags.get("name").map(String::as_str)
    } else {
        None
    }
}

fn road_segment(way: &WayData, coords: &[(f64, f64)]) -> Option<RoadSegment> {
    let name = street_name(&way.tags)?;
    let line = to_line_string(coords);
    let geometry = if way.is_closed() && coords.len() >= 4 && has_value(&way.tags, "area", "yes") {
        Geometry::Polygon(Polygon::new(line, Vec::new()))
    } else if coords.len() >= 2 {
        Geometry::LineString(line)
    } else {
        return None;
    };
    Some(RoadSegment::new(
        ElementKind::Way,
        way.id,
        Some(name.to_string()),
        geometry,
    ))
}

/// A named point inside a polygon of the same name describes the same
/// place: the point keeps both category sets and the polygon is dropped.
fn remove_overlapping_polygons(
    mut points: Vec<PoiEntry>,
    polygons: Vec<PolygonPoi>,
) -> Vec<PoiEntry> {
    let mut removed = vec![false; polygons.len()];
    for point in &mut points {
        let Some(name) = point.name.clone() else {
            continue;
        };
        let location = Point::new(point.lon, point.lat);
        for (index, polygon) in polygons.iter().enumerate() {
            if removed[index] || polygon.entry.name.as_deref() != Some(name.as_str()) {
                continue;
            }
            if polygon.area.contains(&location) {
                info!(
                    "removing {} {} overlapping node {}",
                    polygon.entry.kind.as_str(),
                    polygon.entry.id,
                    point.id
                );
                point
                    .categories
                    .extend(polygon.entry.categories.iter().cloned());
                removed[index] = true;
            }
        }
    }

    points.extend(
        polygons
            .into_iter()
            .zip(removed)
            .filter(|(_, removed)| !removed)
            .map(|(polygon, _)| polygon.entry),
    );
    points
}

pub fn write_pois<W: Write>(
    pois: &[PoiEntry],
    name_max_length: usize,
    writer: &mut Writer<W>,
) -> Result<()> {
    writer.write_record([
        "name",
        "simple_name",
        "categories",
        "lon",
        "lat",
        "osm_type",
        "osm_id",
    ])?;
    for poi in pois {
        let name = truncate(poi.display_name(), name_max_length);
        writer.write_record([
            name.to_string(),
            simplify(&name),
            poi.identifiers().join(";"),
            format!("{:.7}", poi.lon),
            format!("{:.7}", poi.lat),
            poi.kind.as_str().to_string(),
            poi.id.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_streets<W: Write>(streets: &[RoadGroup], writer: &mut Writer<W>) -> Result<()> {
    writer.write_record([
        "name",
        "simple_name",
        "center_lon",
        "center_lat",
        "segments",
        "length_m",
    ])?;
    for street in streets {
        let Some(center) = street.center() else {
            continue;
        };
        writer.write_record([
            street.name().to_string(),
            simplify(street.name()),
            format!("{:.7}", center.x()),
            format!("{:.7}", center.y()),
            street.segments().len().to_string(),
            format!("{:.1}", street.length_m()),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Clone, Debug)]
pub struct OutputPaths {
    pub pois: PathBuf,
    pub streets: PathBuf,
    pub rest: Option<PathBuf>,
}

fn create_writer(path: &Path) -> Result<Writer<std::fs::File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(Writer::from_path(path)?)
}

pub fn extract_to_csv(
    input_path: &Path,
    classifier: &Classifier,
    options: &ExtractOptions,
    outputs: &OutputPaths,
) -> Result<()> {
    let data = read_osm(input_path)?;
    let gazetteer = build_gazetteer(&data, classifier, options.distance_m);

    write_pois(
        &gazetteer.pois,
        options.name_max_length,
        &mut create_writer(&outputs.pois)?,
    )?;
    write_streets(&gazetteer.streets, &mut create_writer(&outputs.streets)?)?;
    if let Some(path) = &outputs.rest {
        gazetteer.rest.write_csv(&mut create_writer(path)?)?;
    }
    Ok(())
}

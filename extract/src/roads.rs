use crate::geometry::{
    closest_coord, haversine_m, path_length_m, project_geometry, unproject, Shape,
};
use crate::graph::ProximityGraph;
use geo::{
    BoundingRect, ClosestPoint, Coord, Geometry, GeometryCollection, LineString, MultiLineString,
    Point,
};
use log::{debug, info};
use rayon::prelude::*;
use std::collections::BTreeMap;

pub const DEFAULT_DISTANCE_M: f64 = 500.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementKind {
    Node,
    Way,
    Relation,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }
}

#[derive(Clone, Debug)]
pub struct RoadSegment {
    pub kind: ElementKind,
    pub id: i64,
    pub name: Option<String>,
    pub geometry: Geometry<f64>,
}

impl RoadSegment {
    pub fn new(kind: ElementKind, id: i64, name: Option<String>, geometry: Geometry<f64>) -> Self {
        Self {
            kind,
            id,
            name,
            geometry,
        }
    }

    fn key(&self) -> (ElementKind, i64) {
        (self.kind, self.id)
    }
}

#[derive(Clone, Debug)]
pub struct RoadGroup {
    name: String,
    segments: Vec<RoadSegment>,
    linework: Option<MultiLineString<f64>>,
    center: Option<Point<f64>>,
}

impl RoadGroup {
    fn new(name: String, mut segments: Vec<RoadSegment>) -> Self {
        segments.sort_by_key(|segment| segment.key());
        let linework = merge_linework(&segments);
        let center = representative_point(&segments, linework.as_ref());
        Self {
            name,
            segments,
            linework,
            center,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn segments(&self) -> &[RoadSegment] {
        &self.segments
    }

    pub fn linework(&self) -> Option<&MultiLineString<f64>> {
        self.linework.as_ref()
    }

    pub fn center(&self) -> Option<Point<f64>> {
        self.center
    }

    pub fn length_m(&self) -> f64 {
        self.linework
            .as_ref()
            .map(|lines| lines.iter().map(path_length_m).sum::<f64>())
            .unwrap_or(0.0)
    }

    fn first_key(&self) -> Option<(ElementKind, i64)> {
        self.segments.first().map(|segment| segment.key())
    }
}

/// Link same-named segments within `distance_m` of each other into streets.
pub fn group_roads(segments: Vec<RoadSegment>, distance_m: f64) -> Vec<RoadGroup> {
    let total = segments.len();
    let mut buckets: BTreeMap<String, Vec<RoadSegment>> = BTreeMap::new();
    for segment in segments {
        let Some(name) = segment.name.clone().filter(|name| !name.is_empty()) else {
            continue;
        };
        buckets.entry(name).or_default().push(segment);
    }

    let mut groups: Vec<RoadGroup> = buckets
        .into_par_iter()
        .flat_map(|(name, bucket)| group_bucket(name, bucket, distance_m))
        .collect();
    groups.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.first_key().cmp(&b.first_key()))
    });

    info!("built {} streets from {} segments", groups.len(), total);
    groups
}

fn group_bucket(name: String, bucket: Vec<RoadSegment>, distance_m: f64) -> Vec<RoadGroup> {
    if bucket.len() == 1 {
        return vec![RoadGroup::new(name, bucket)];
    }

    let shapes: Vec<Shape> = bucket
        .iter()
        .map(|segment| Shape::new(&project_geometry(&segment.geometry)))
        .collect();

    let mut graph = ProximityGraph::with_capacity(bucket.len());
    for segment in bucket {
        graph.add_node(segment);
    }
    for i in 0..shapes.len() {
        for j in (i + 1)..shapes.len() {
            if graph.connected(i, j) {
                continue;
            }
            if within(&shapes[i], &shapes[j], distance_m) {
                graph.add_edge(i, j);
            }
        }
    }

    let components = graph.into_partition();
    debug!("{name}: {} segments in {} groups", shapes.len(), components.len());
    components
        .into_iter()
        .map(|members| RoadGroup::new(name.clone(), members))
        .collect()
}

fn within(a: &Shape, b: &Shape, distance_m: f64) -> bool {
    match a.nearest_points(b) {
        Some((p, q)) => haversine_m(unproject(p), unproject(q)) <= distance_m,
        None => false,
    }
}

fn merge_linework(segments: &[RoadSegment]) -> Option<MultiLineString<f64>> {
    let mut raw = Vec::new();
    for segment in segments {
        collect_lines(&segment.geometry, &mut raw);
    }

    let mut lines: Vec<LineString<f64>> = Vec::with_capacity(raw.len());
    for line in raw.iter().filter_map(repair) {
        if !lines.contains(&line) {
            lines.push(line);
        }
    }
    if lines.is_empty() {
        return None;
    }
    Some(MultiLineString::new(lines))
}

fn collect_lines(geometry: &Geometry<f64>, lines: &mut Vec<LineString<f64>>) {
    match geometry {
        Geometry::Point(_) | Geometry::MultiPoint(_) => {}
        Geometry::Line(line) => lines.push(LineString::new(vec![line.start, line.end])),
        Geometry::LineString(line) => lines.push(line.clone()),
        Geometry::MultiLineString(multi) => lines.extend(multi.iter().cloned()),
        Geometry::Polygon(polygon) => {
            lines.push(polygon.exterior().clone());
            lines.extend(polygon.interiors().iter().cloned());
        }
        Geometry::MultiPolygon(polygons) => {
            for polygon in polygons {
                lines.push(polygon.exterior().clone());
                lines.extend(polygon.interiors().iter().cloned());
            }
        }
        Geometry::Rect(rect) => lines.push(rect.to_polygon().exterior().clone()),
        Geometry::Triangle(triangle) => lines.push(triangle.to_polygon().exterior().clone()),
        Geometry::GeometryCollection(collection) => {
            for geometry in collection {
                collect_lines(geometry, lines);
            }
        }
    }
}

fn repair(line: &LineString<f64>) -> Option<LineString<f64>> {
    let mut coords: Vec<Coord<f64>> = line
        .0
        .iter()
        .copied()
        .filter(|coord| coord.x.is_finite() && coord.y.is_finite())
        .collect();
    coords.dedup();
    if coords.len() < 2 {
        return None;
    }
    Some(LineString::new(coords))
}

fn representative_point(
    segments: &[RoadSegment],
    linework: Option<&MultiLineString<f64>>,
) -> Option<Point<f64>> {
    let collection = GeometryCollection::from(
        segments
            .iter()
            .map(|segment| segment.geometry.clone())
            .collect::<Vec<_>>(),
    );
    let mid = Point::from(collection.bounding_rect()?.center());
    let closest = match linework {
        Some(lines) => lines.closest_point(&mid),
        None => collection.closest_point(&mid),
    };
    closest_coord(closest).map(Point::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, polygon};

    const METERS_PER_DEGREE: f64 = 111_195.08;

    fn deg(meters: f64) -> f64 {
        meters / METERS_PER_DEGREE
    }

    /// East-west segment on the equator between two offsets in meters.
    fn segment(id: i64, name: &str, from_m: f64, to_m: f64) -> RoadSegment {
        RoadSegment::new(
            ElementKind::Way,
            id,
            Some(name.to_string()),
            Geometry::LineString(line_string![(x: deg(from_m), y: 0.0), (x: deg(to_m), y: 0.0)]),
        )
    }

    fn ids(group: &RoadGroup) -> Vec<i64> {
        group.segments().iter().map(|segment| segment.id).collect()
    }

    #[test]
    fn oak_street_segments_merge() {
        let segments = vec![
            segment(1, "Oak Street", 0.0, 100.0),
            segment(2, "Oak Street", 110.0, 490.0),
            segment(3, "Oak Street", 500.0, 600.0),
        ];
        let groups = group_roads(segments, 500.0);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name(), "Oak Street");
        assert_eq!(ids(&groups[0]), vec![1, 2, 3]);
        assert_eq!(groups[0].linework().unwrap().0.len(), 3);
    }

    #[test]
    fn threshold_separates_segments() {
        let near = group_roads(
            vec![segment(1, "Elm", 0.0, 100.0), segment(2, "Elm", 580.0, 700.0)],
            500.0,
        );
        assert_eq!(near.len(), 1);

        let far = group_roads(
            vec![segment(1, "Elm", 0.0, 100.0), segment(2, "Elm", 620.0, 700.0)],
            500.0,
        );
        assert_eq!(far.len(), 2);
        assert_eq!(ids(&far[0]), vec![1]);
        assert_eq!(ids(&far[1]), vec![2]);
    }

    #[test]
    fn grouping_is_transitive() {
        let segments = vec![
            segment(1, "Main", 0.0, 100.0),
            segment(3, "Main", 260.0, 300.0),
            segment(2, "Main", 130.0, 230.0),
        ];
        let groups = group_roads(segments, 50.0);
        assert_eq!(groups.len(), 1);
        assert_eq!(ids(&groups[0]), vec![1, 2, 3]);
    }

    #[test]
    fn different_names_never_merge() {
        let segments = vec![
            segment(1, "Birch", 0.0, 100.0),
            segment(2, "Aspen", 0.0, 100.0),
            RoadSegment::new(
                ElementKind::Way,
                3,
                None,
                Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 0.001, y: 0.0)]),
            ),
        ];
        let groups = group_roads(segments, 500.0);
        let names: Vec<&str> = groups.iter().map(|group| group.name()).collect();
        assert_eq!(names, vec!["Aspen", "Birch"]);
    }

    #[test]
    fn polygon_members_contribute_rings() {
        let square = polygon!(
            exterior: [
                (x: 0.0, y: 0.0),
                (x: 0.001, y: 0.0),
                (x: 0.001, y: 0.001),
                (x: 0.0, y: 0.001),
                (x: 0.0, y: 0.0),
            ],
            interiors: [
                [
                    (x: 0.0004, y: 0.0004),
                    (x: 0.0006, y: 0.0004),
                    (x: 0.0006, y: 0.0006),
                    (x: 0.0004, y: 0.0004),
                ],
            ],
        );
        let segments = vec![
            RoadSegment::new(ElementKind::Way, 1, Some("Plaza".to_string()), Geometry::Polygon(square)),
            segment(2, "Plaza", 150.0, 200.0),
        ];
        let groups = group_roads(segments, 500.0);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].linework().unwrap().0.len(), 3);
    }

    #[test]
    fn center_lies_on_the_linework() {
        let segments = vec![
            RoadSegment::new(
                ElementKind::Way,
                1,
                Some("Corner".to_string()),
                Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 0.01, y: 0.0)]),
            ),
            RoadSegment::new(
                ElementKind::Way,
                2,
                Some("Corner".to_string()),
                Geometry::LineString(line_string![(x: 0.01, y: 0.0), (x: 0.01, y: 0.004)]),
            ),
        ];
        let groups = group_roads(segments, 500.0);
        assert_eq!(groups.len(), 1);
        let center = groups[0].center().unwrap();
        assert!((center.x() - 0.005).abs() < 1e-12);
        assert!(center.y().abs() < 1e-12);
    }

    #[test]
    fn degenerate_linework_is_absent() {
        let segments = vec![
            RoadSegment::new(
                ElementKind::Way,
                1,
                Some("Stub".to_string()),
                Geometry::LineString(line_string![(x: 1.0, y: 1.0), (x: 1.0, y: 1.0)]),
            ),
            RoadSegment::new(
                ElementKind::Node,
                2,
                Some("Stub".to_string()),
                Geometry::Point(Point::new(1.0, 1.0)),
            ),
        ];
        let groups = group_roads(segments, 500.0);
        assert_eq!(groups.len(), 1);
        assert!(groups[0].linework().is_none());
        assert_eq!(groups[0].length_m(), 0.0);
        assert_eq!(groups[0].center(), Some(Point::new(1.0, 1.0)));
    }

    #[test]
    fn distance_is_measured_on_the_sphere() {
        // At 60 degrees north a meter on the ground spans two Mercator meters.
        let lat: f64 = 60.0;
        let lon_deg = |meters: f64| deg(meters) / lat.to_radians().cos();
        let at = |id: i64, from_m: f64, to_m: f64| {
            RoadSegment::new(
                ElementKind::Way,
                id,
                Some("Nordweg".to_string()),
                Geometry::LineString(
                    line_string![(x: lon_deg(from_m), y: lat), (x: lon_deg(to_m), y: lat)],
                ),
            )
        };

        let near = group_roads(vec![at(1, 0.0, 100.0), at(2, 500.0, 600.0)], 500.0);
        assert_eq!(near.len(), 1);
        assert_eq!(ids(&near[0]), vec![1, 2]);

        let far = group_roads(vec![at(1, 0.0, 100.0), at(2, 700.0, 800.0)], 500.0);
        assert_eq!(far.len(), 2);
    }

    #[test]
    fn length_sums_linework() {
        let groups = group_roads(
            vec![segment(1, "Long", 0.0, 1000.0), segment(2, "Long", 1000.0, 1500.0)],
            500.0,
        );
        assert!((groups[0].length_m() - 1500.0).abs() < 0.5);
    }
}

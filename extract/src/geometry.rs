use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{
    Closest, ClosestPoint, Contains, Coord, Distance, Geometry, Haversine, Line, LineString,
    MapCoords, Point, Polygon,
};
use std::f64::consts::PI;

const MERCATOR_RADIUS_M: f64 = 6_378_137.0;
const MERCATOR_MAX_LAT: f64 = 85.051_128_78;

pub fn project(coord: Coord<f64>) -> Coord<f64> {
    let lat = coord.y.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT).to_radians();
    Coord {
        x: MERCATOR_RADIUS_M * coord.x.to_radians(),
        y: MERCATOR_RADIUS_M * (PI / 4.0 + lat / 2.0).tan().ln(),
    }
}

pub fn unproject(coord: Coord<f64>) -> Coord<f64> {
    Coord {
        x: (coord.x / MERCATOR_RADIUS_M).to_degrees(),
        y: (2.0 * (coord.y / MERCATOR_RADIUS_M).exp().atan() - PI / 2.0).to_degrees(),
    }
}

pub fn project_geometry(geometry: &Geometry<f64>) -> Geometry<f64> {
    geometry.map_coords(project)
}

pub fn haversine_m(a: Coord<f64>, b: Coord<f64>) -> f64 {
    Haversine.distance(Point::from(a), Point::from(b))
}

pub fn path_length_m(line: &LineString<f64>) -> f64 {
    line.lines()
        .map(|segment| haversine_m(segment.start, segment.end))
        .sum()
}

pub fn closest_coord(closest: Closest<f64>) -> Option<Coord<f64>> {
    match closest {
        Closest::Intersection(point) | Closest::SinglePoint(point) => Some(point.0),
        Closest::Indeterminate => None,
    }
}

#[derive(Clone, Debug, Default)]
pub struct Shape {
    points: Vec<Coord<f64>>,
    segments: Vec<Line<f64>>,
    polygons: Vec<Polygon<f64>>,
}

impl Shape {
    pub fn new(geometry: &Geometry<f64>) -> Self {
        let mut shape = Self::default();
        shape.add(geometry);
        shape
    }

    fn add(&mut self, geometry: &Geometry<f64>) {
        match geometry {
            Geometry::Point(point) => self.points.push(point.0),
            Geometry::MultiPoint(points) => {
                self.points.extend(points.iter().map(|point| point.0))
            }
            Geometry::Line(line) => self.segments.push(*line),
            Geometry::LineString(line) => self.add_line_string(line),
            Geometry::MultiLineString(lines) => {
                for line in lines {
                    self.add_line_string(line);
                }
            }
            Geometry::Polygon(polygon) => self.add_polygon(polygon),
            Geometry::MultiPolygon(polygons) => {
                for polygon in polygons {
                    self.add_polygon(polygon);
                }
            }
            Geometry::Rect(rect) => self.add_polygon(&rect.to_polygon()),
            Geometry::Triangle(triangle) => self.add_polygon(&triangle.to_polygon()),
            Geometry::GeometryCollection(collection) => {
                for geometry in collection {
                    self.add(geometry);
                }
            }
        }
    }

    fn add_line_string(&mut self, line: &LineString<f64>) {
        match line.0.len() {
            0 => {}
            1 => self.points.push(line.0[0]),
            _ => self.segments.extend(line.lines()),
        }
    }

    fn add_polygon(&mut self, polygon: &Polygon<f64>) {
        self.add_line_string(polygon.exterior());
        for interior in polygon.interiors() {
            self.add_line_string(interior);
        }
        if polygon.exterior().0.len() >= 4 {
            self.polygons.push(polygon.clone());
        }
    }

    fn is_empty(&self) -> bool {
        self.points.is_empty() && self.segments.is_empty()
    }

    fn vertices(&self) -> impl Iterator<Item = Coord<f64>> + '_ {
        self.points.iter().copied().chain(
            self.segments
                .iter()
                .flat_map(|segment| [segment.start, segment.end]),
        )
    }

    fn covered_vertex(&self, other: &Shape) -> Option<Coord<f64>> {
        self.polygons.iter().find_map(|polygon| {
            other
                .vertices()
                .find(|vertex| polygon.contains(&Point::from(*vertex)))
        })
    }

    /// The closest pair of points between two shapes, in planar terms. The
    /// first point lies on `self`, the second on `other`.
    pub fn nearest_points(&self, other: &Shape) -> Option<(Coord<f64>, Coord<f64>)> {
        if self.is_empty() || other.is_empty() {
            return None;
        }
        if let Some(vertex) = self.covered_vertex(other) {
            return Some((vertex, vertex));
        }
        if let Some(vertex) = other.covered_vertex(self) {
            return Some((vertex, vertex));
        }

        let mut best: Option<(Coord<f64>, Coord<f64>, f64)> = None;
        let mut consider = |a: Coord<f64>, b: Coord<f64>| {
            let distance = distance_sq(a, b);
            match best {
                Some((_, _, best_distance)) if best_distance <= distance => {}
                _ => best = Some((a, b, distance)),
            }
        };

        for &p in &self.points {
            for &q in &other.points {
                consider(p, q);
            }
            for segment in &other.segments {
                consider(p, closest_on_segment(p, segment));
            }
        }
        for segment in &self.segments {
            for &q in &other.points {
                consider(closest_on_segment(q, segment), q);
            }
            for other_segment in &other.segments {
                let (a, b) = segment_pair(segment, other_segment);
                consider(a, b);
            }
        }

        best.map(|(a, b, _)| (a, b))
    }
}

fn distance_sq(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

fn closest_on_segment(p: Coord<f64>, segment: &Line<f64>) -> Coord<f64> {
    closest_coord(segment.closest_point(&Point::from(p))).unwrap_or(segment.start)
}

fn segment_pair(a: &Line<f64>, b: &Line<f64>) -> (Coord<f64>, Coord<f64>) {
    match line_intersection(*a, *b) {
        Some(LineIntersection::SinglePoint { intersection, .. }) => (intersection, intersection),
        Some(LineIntersection::Collinear { intersection }) => {
            (intersection.start, intersection.start)
        }
        None => {
            let candidates = [
                (a.start, closest_on_segment(a.start, b)),
                (a.end, closest_on_segment(a.end, b)),
                (closest_on_segment(b.start, a), b.start),
                (closest_on_segment(b.end, a), b.end),
            ];
            candidates
                .into_iter()
                .min_by(|x, y| distance_sq(x.0, x.1).total_cmp(&distance_sq(y.0, y.1)))
                .unwrap_or((a.start, b.start))
        }
    }
}

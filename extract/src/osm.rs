use crate::config::attr_value;
use crate::tags::{has_value, TagSet};
use crate::Result;
use geo::{Contains, Coord, LineString, MultiPolygon, Point, Polygon};
use log::{debug, info};
use osmpbfreader::{OsmObj, OsmPbfReader, Tags};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct NodeData {
    pub id: i64,
    pub coord: (f64, f64),
    pub tags: TagSet,
}

#[derive(Clone, Debug, Default)]
pub struct WayData {
    pub id: i64,
    pub node_refs: Vec<i64>,
    pub tags: TagSet,
}

impl WayData {
    pub fn is_closed(&self) -> bool {
        self.node_refs.len() >= 2 && self.node_refs.first() == self.node_refs.last()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Member {
    pub way: i64,
    pub role: String,
}

#[derive(Clone, Debug, Default)]
pub struct RelationData {
    pub id: i64,
    pub members: Vec<Member>,
    pub tags: TagSet,
}

#[derive(Debug, Default)]
pub struct OsmData {
    pub nodes: HashMap<i64, (f64, f64)>,
    pub way_nodes: HashMap<i64, Vec<i64>>,
    pub tagged_nodes: Vec<NodeData>,
    pub ways: Vec<WayData>,
    pub relations: Vec<RelationData>,
}

impl OsmData {
    pub fn way_coords(&self, way: &WayData) -> Option<Vec<(f64, f64)>> {
        self.coords(&way.node_refs)
    }

    fn coords(&self, node_refs: &[i64]) -> Option<Vec<(f64, f64)>> {
        node_refs
            .iter()
            .map(|node_id| self.nodes.get(node_id).copied())
            .collect()
    }

    /// Area of a multipolygon relation. Outer rings are joined from their
    /// member ways; each inner ring goes to the first outer ring holding it.
    pub fn multipolygon(&self, relation: &RelationData) -> Option<MultiPolygon<f64>> {
        let mut outer = Vec::new();
        let mut inner = Vec::new();
        for member in &relation.members {
            let Some(coords) = self
                .way_nodes
                .get(&member.way)
                .and_then(|node_refs| self.coords(node_refs))
            else {
                debug!("relation {} misses way {}", relation.id, member.way);
                continue;
            };
            let coords: Vec<Coord<f64>> = coords.into_iter().map(|(x, y)| Coord { x, y }).collect();
            match member.role.as_str() {
                "inner" => inner.push(coords),
                _ => outer.push(coords),
            }
        }

        let mut polygons: Vec<(LineString<f64>, Vec<LineString<f64>>)> = assemble_rings(outer)
            .into_iter()
            .map(|ring| (ring, Vec::new()))
            .collect();
        if polygons.is_empty() {
            return None;
        }
        for ring in assemble_rings(inner) {
            let start = Point::from(ring.0[0]);
            let holder = polygons
                .iter_mut()
                .find(|(exterior, _)| Polygon::new(exterior.clone(), Vec::new()).contains(&start));
            if let Some((_, interiors)) = holder {
                interiors.push(ring);
            }
        }
        Some(MultiPolygon::new(
            polygons
                .into_iter()
                .map(|(exterior, interiors)| Polygon::new(exterior, interiors))
                .collect(),
        ))
    }

    fn add_node(&mut self, node: NodeData) {
        self.nodes.insert(node.id, node.coord);
        if !node.tags.is_empty() {
            self.tagged_nodes.push(node);
        }
    }

    fn add_way(&mut self, way: WayData) {
        self.way_nodes.insert(way.id, way.node_refs.clone());
        if !way.tags.is_empty() {
            self.ways.push(way);
        }
    }

    fn add_relation(&mut self, relation: RelationData) {
        if is_multipolygon(&relation.tags) {
            self.relations.push(relation);
        }
    }
}

fn is_multipolygon(tags: &TagSet) -> bool {
    has_value(tags, "type", "multipolygon")
}

/// Join way pieces end to end into closed rings. Pieces that never close
/// are dropped.
fn assemble_rings(mut pieces: Vec<Vec<Coord<f64>>>) -> Vec<LineString<f64>> {
    pieces.retain(|piece| piece.len() >= 2);
    let mut rings = Vec::new();
    while !pieces.is_empty() {
        let mut ring = pieces.remove(0);
        loop {
            let (Some(&first), Some(&last)) = (ring.first(), ring.last()) else {
                break;
            };
            if ring.len() >= 4 && first == last {
                rings.push(LineString::new(ring));
                break;
            }
            let next = pieces
                .iter()
                .position(|piece| piece.first() == Some(&last) || piece.last() == Some(&last));
            let Some(index) = next else {
                debug!("dropping open ring with {} coordinates", ring.len());
                break;
            };
            let mut piece = pieces.remove(index);
            if piece.first() != Some(&last) {
                piece.reverse();
            }
            ring.extend(piece.into_iter().skip(1));
        }
    }
    rings
}

pub fn read_osm(input_path: &Path) -> Result<OsmData> {
    let ext = input_path.extension().and_then(|value| value.to_str());
    let data = match ext {
        Some("osm") => {
            let file = File::open(input_path)?;
            read_osm_xml(BufReader::new(file))?
        }
        _ => read_pbf(input_path)?,
    };
    info!(
        "read {} nodes, {} tagged nodes, {} tagged ways and {} multipolygons from {}",
        data.nodes.len(),
        data.tagged_nodes.len(),
        data.ways.len(),
        data.relations.len(),
        input_path.display()
    );
    Ok(data)
}

enum Element {
    Node(NodeData),
    Way(WayData),
    Relation(RelationData),
}

pub fn read_osm_xml<R: BufRead>(input: R) -> Result<OsmData> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut data = OsmData::default();
    let mut current: Option<Element> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => match e.name().as_ref() {
                b"node" => current = parse_node(&e)?.map(Element::Node),
                b"way" => current = Some(Element::Way(parse_way(&e)?)),
                b"relation" => current = Some(Element::Relation(parse_relation(&e)?)),
                _ => add_child(&e, current.as_mut())?,
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"node" => {
                    if let Some(node) = parse_node(&e)? {
                        data.add_node(node);
                    }
                }
                b"way" => data.add_way(parse_way(&e)?),
                b"relation" => data.add_relation(parse_relation(&e)?),
                _ => add_child(&e, current.as_mut())?,
            },
            Event::End(e) => match e.name().as_ref() {
                b"node" | b"way" | b"relation" => match current.take() {
                    Some(Element::Node(node)) => data.add_node(node),
                    Some(Element::Way(way)) => data.add_way(way),
                    Some(Element::Relation(relation)) => data.add_relation(relation),
                    None => {}
                },
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    Ok(data)
}

fn parse_i64(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<i64>> {
    Ok(attr_value(e, key)?.and_then(|value| value.parse::<i64>().ok()))
}

fn parse_f64(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<f64>> {
    Ok(attr_value(e, key)?.and_then(|value| value.parse::<f64>().ok()))
}

fn parse_node(e: &BytesStart<'_>) -> Result<Option<NodeData>> {
    let id = parse_i64(e, b"id")?;
    let lat = parse_f64(e, b"lat")?;
    let lon = parse_f64(e, b"lon")?;
    Ok(match (id, lat, lon) {
        (Some(id), Some(lat), Some(lon)) => Some(NodeData {
            id,
            coord: (lon, lat),
            tags: TagSet::new(),
        }),
        _ => None,
    })
}

fn parse_way(e: &BytesStart<'_>) -> Result<WayData> {
    Ok(WayData {
        id: parse_i64(e, b"id")?.unwrap_or_default(),
        ..WayData::default()
    })
}

fn parse_relation(e: &BytesStart<'_>) -> Result<RelationData> {
    Ok(RelationData {
        id: parse_i64(e, b"id")?.unwrap_or_default(),
        ..RelationData::default()
    })
}

fn add_child(e: &BytesStart<'_>, element: Option<&mut Element>) -> Result<()> {
    let Some(element) = element else {
        return Ok(());
    };
    match (e.name().as_ref(), element) {
        (b"tag", element) => {
            let (Some(key), Some(value)) = (attr_value(e, b"k")?, attr_value(e, b"v")?) else {
                return Ok(());
            };
            let tags = match element {
                Element::Node(node) => &mut node.tags,
                Element::Way(way) => &mut way.tags,
                Element::Relation(relation) => &mut relation.tags,
            };
            tags.insert(key, value);
        }
        (b"nd", Element::Way(way)) => {
            if let Some(reference) = parse_i64(e, b"ref")? {
                way.node_refs.push(reference);
            }
        }
        (b"member", Element::Relation(relation)) => {
            if attr_value(e, b"type")?.as_deref() != Some("way") {
                return Ok(());
            }
            if let Some(way) = parse_i64(e, b"ref")? {
                let role = attr_value(e, b"role")?.unwrap_or_default();
                relation.members.push(Member { way, role });
            }
        }
        _ => {}
    }
    Ok(())
}

fn tag_set(tags: &Tags) -> TagSet {
    tags.iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn read_pbf(input_path: &Path) -> Result<OsmData> {
    let file = File::open(input_path)?;
    let mut pbf = OsmPbfReader::new(file);

    let objs = pbf.get_objs_and_deps(|obj| match obj {
        OsmObj::Way(way) => !way.tags.is_empty(),
        OsmObj::Node(node) => !node.tags.is_empty(),
        OsmObj::Relation(relation) => is_multipolygon(&tag_set(&relation.tags)),
    })?;

    let mut data = OsmData::default();
    for obj in objs.values() {
        match obj {
            OsmObj::Node(node) => data.add_node(NodeData {
                id: node.id.0,
                coord: (node.lon(), node.lat()),
                tags: tag_set(&node.tags),
            }),
            OsmObj::Way(way) => data.add_way(WayData {
                id: way.id.0,
                node_refs: way.nodes.iter().map(|node_id| node_id.0).collect(),
                tags: tag_set(&way.tags),
            }),
            OsmObj::Relation(relation) => data.add_relation(RelationData {
                id: relation.id.0,
                members: relation
                    .refs
                    .iter()
                    .filter_map(|member| {
                        member.member.way().map(|way_id| Member {
                            way: way_id.0,
                            role: member.role.to_string(),
                        })
                    })
                    .collect(),
                tags: tag_set(&relation.tags),
            }),
        }
    }
    Ok(data)
}

pub fn find_default_pbf(folder: &Path) -> Result<PathBuf> {
    let mut pbfs = Vec::new();
    for entry in folder.read_dir()? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("pbf") {
            pbfs.push(path);
        }
    }
    pbfs.sort();

    match pbfs.len() {
        0 => Err("no .pbf files found in current directory".into()),
        1 => Ok(pbfs.remove(0)),
        _ => Err("multiple .pbf files found; pass --input explicitly".into()),
    }
}

//! GeoJSON to TopoJSON conversion.
//!
//! Builds a topology with a single `collection` object from a GeoJSON
//! FeatureCollection. Every line and ring becomes an arc; identical lines
//! (in either direction) share one arc, which is what makes shared borders
//! between polygons compact. Coordinates are not quantized.

use std::collections::HashMap;

use serde_json::{json, Map, Value};

/// Name of the object holding the converted features.
pub const COLLECTION_OBJECT: &str = "collection";

/// True for objects carrying a `features` array.
pub fn is_feature_collection(data: &Value) -> bool {
    data.get("features").map_or(false, Value::is_array)
}

/// Converts a FeatureCollection into a TopoJSON topology.
///
/// Returns `None` when `data` has no `features` array. Features with a
/// missing or unknown geometry become null-type geometries that keep their
/// properties.
pub fn from_feature_collection(data: &Value) -> Option<Value> {
    let features = data.get("features")?.as_array()?;

    let mut builder = TopologyBuilder::default();
    let geometries: Vec<Value> = features
        .iter()
        .map(|feature| builder.feature(feature))
        .collect();

    Some(builder.finish(geometries))
}

#[derive(Debug, Default)]
struct TopologyBuilder {
    arcs: Vec<Value>,
    arc_index: HashMap<String, usize>,
    bbox: Option<[f64; 4]>,
}

impl TopologyBuilder {
    fn feature(&mut self, feature: &Value) -> Value {
        let mut object = self.geometry(feature.get("geometry").unwrap_or(&Value::Null));

        if let Value::Object(map) = &mut object {
            if let Some(id) = feature.get("id") {
                map.insert("id".to_string(), id.clone());
            }
            match feature.get("properties") {
                Some(properties) if !properties.is_null() => {
                    map.insert("properties".to_string(), properties.clone());
                }
                _ => {}
            }
        }
        object
    }

    fn geometry(&mut self, geometry: &Value) -> Value {
        let kind = geometry.get("type").and_then(Value::as_str);
        let coordinates = geometry.get("coordinates");

        match (kind, coordinates) {
            (Some("Point"), Some(point)) => {
                self.extend_bbox(point);
                json!({ "type": "Point", "coordinates": point })
            }
            (Some("MultiPoint"), Some(Value::Array(points))) => {
                points.iter().for_each(|point| self.extend_bbox(point));
                json!({ "type": "MultiPoint", "coordinates": points })
            }
            (Some("LineString"), Some(line)) => {
                json!({ "type": "LineString", "arcs": self.line(line) })
            }
            (Some("MultiLineString"), Some(Value::Array(lines))) => {
                let arcs: Vec<Vec<i64>> = lines.iter().map(|line| self.line(line)).collect();
                json!({ "type": "MultiLineString", "arcs": arcs })
            }
            (Some("Polygon"), Some(rings)) => {
                json!({ "type": "Polygon", "arcs": self.polygon(rings) })
            }
            (Some("MultiPolygon"), Some(Value::Array(polygons))) => {
                let arcs: Vec<Vec<Vec<i64>>> = polygons
                    .iter()
                    .map(|polygon| self.polygon(polygon))
                    .collect();
                json!({ "type": "MultiPolygon", "arcs": arcs })
            }
            (Some("GeometryCollection"), _) => {
                let geometries: Vec<Value> = geometry
                    .get("geometries")
                    .and_then(Value::as_array)
                    .map(|members| members.iter().map(|member| self.geometry(member)).collect())
                    .unwrap_or_default();
                json!({ "type": "GeometryCollection", "geometries": geometries })
            }
            _ => json!({ "type": null }),
        }
    }

    fn polygon(&mut self, rings: &Value) -> Vec<Vec<i64>> {
        rings
            .as_array()
            .map(|rings| rings.iter().map(|ring| self.line(ring)).collect())
            .unwrap_or_default()
    }

    fn line(&mut self, positions: &Value) -> Vec<i64> {
        vec![self.arc(positions)]
    }

    /// Returns the arc index for `positions`, reusing an existing arc when the
    /// same line was seen before. A reversed match is encoded as `!index`.
    fn arc(&mut self, positions: &Value) -> i64 {
        let positions: Vec<Value> = positions.as_array().cloned().unwrap_or_default();
        positions.iter().for_each(|position| self.extend_bbox(position));

        let key = Value::Array(positions.clone()).to_string();
        if let Some(&index) = self.arc_index.get(&key) {
            return index as i64;
        }

        let reversed: Vec<Value> = positions.iter().rev().cloned().collect();
        let reversed_key = Value::Array(reversed).to_string();
        if let Some(&index) = self.arc_index.get(&reversed_key) {
            return !(index as i64);
        }

        let index = self.arcs.len();
        self.arcs.push(Value::Array(positions));
        self.arc_index.insert(key, index);
        index as i64
    }

    fn extend_bbox(&mut self, position: &Value) {
        let x = position.get(0).and_then(Value::as_f64);
        let y = position.get(1).and_then(Value::as_f64);
        let (Some(x), Some(y)) = (x, y) else {
            return;
        };

        self.bbox = Some(match self.bbox {
            Some([x0, y0, x1, y1]) => [x0.min(x), y0.min(y), x1.max(x), y1.max(y)],
            None => [x, y, x, y],
        });
    }

    fn finish(self, geometries: Vec<Value>) -> Value {
        let mut objects = Map::new();
        objects.insert(
            COLLECTION_OBJECT.to_string(),
            json!({ "type": "GeometryCollection", "geometries": geometries }),
        );

        let mut topology = Map::new();
        topology.insert("type".to_string(), json!("Topology"));
        if let Some(bbox) = self.bbox {
            topology.insert("bbox".to_string(), json!(bbox));
        }
        topology.insert("objects".to_string(), Value::Object(objects));
        topology.insert("arcs".to_string(), Value::Array(self.arcs));
        Value::Object(topology)
    }
}

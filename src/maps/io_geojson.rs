// Reader for the county boundaries (GeoJSON FeatureCollection).

use std::collections::BTreeMap;

use crate::maps::*;

/// A polygon is a list of rings of (longitude, latitude) points.
pub type Polygon = Vec<Vec<(f64, f64)>>;

#[derive(PartialEq, Debug, Clone)]
pub struct County {
    pub fips: Fips,
    pub polygons: Vec<Polygon>,
}

/// The geographic reference: every known county with its boundaries, sorted by key.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct GeoReference {
    pub counties: Vec<County>,
}

impl GeoReference {
    pub fn universe(&self) -> GeoKeyUniverse {
        self.counties.iter().map(|c| c.fips).collect()
    }

    /// (min_lon, min_lat, max_lon, max_lat) over all the points.
    pub fn bbox(&self) -> (f64, f64, f64, f64) {
        let mut res = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
        let points = self
            .counties
            .iter()
            .flat_map(|c| c.polygons.iter())
            .flat_map(|p| p.iter())
            .flat_map(|r| r.iter());
        for (lon, lat) in points {
            res.0 = res.0.min(*lon);
            res.1 = res.1.min(*lat);
            res.2 = res.2.max(*lon);
            res.3 = res.3.max(*lat);
        }
        if res.0 > res.2 {
            (0.0, 0.0, 1.0, 1.0)
        } else {
            res
        }
    }
}

pub fn read_geojson(path: &str, settings: &GeoSettings) -> MapResult<GeoReference> {
    info!("Attempting to read county reference {:?}", path);
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    let res = parse_feature_collection(&js, settings.key_property.as_deref())?;
    info!("Read {:?} counties from {:?}", res.counties.len(), path);
    Ok(res)
}

pub fn parse_feature_collection(
    js: &JSValue,
    key_property: Option<&str>,
) -> MapResult<GeoReference> {
    let features = js["features"].as_array().context(GeoJsonShapeSnafu {
        message: "missing features array",
    })?;

    // Several features may share a key (e.g. islands exported separately).
    let mut by_key: BTreeMap<Fips, Vec<Polygon>> = BTreeMap::new();
    for (idx, feature) in features.iter().enumerate() {
        let key_js = match key_property {
            Some(p) => &feature["properties"][p],
            None => &feature["id"],
        };
        let key_s = match key_js {
            JSValue::String(s) => s.clone(),
            JSValue::Number(n) => n.to_string(),
            _ => {
                return GeoJsonShapeSnafu {
                    message: format!("feature {} has no key", idx),
                }
                .fail();
            }
        };
        let fips = Fips::parse(&key_s).context(DataSnafu {})?;
        let polygons = read_geometry(&feature["geometry"]).context(GeoJsonShapeSnafu {
            message: format!("feature {} ({}) has an unsupported geometry", idx, fips),
        })?;
        debug!("feature {:?}: {} with {:?} polygons", idx, fips, polygons.len());
        by_key.entry(fips).or_default().extend(polygons);
    }

    Ok(GeoReference {
        counties: by_key
            .into_iter()
            .map(|(fips, polygons)| County { fips, polygons })
            .collect(),
    })
}

fn read_geometry(geometry: &JSValue) -> Option<Vec<Polygon>> {
    let coords = &geometry["coordinates"];
    match geometry["type"].as_str()? {
        "Polygon" => Some(vec![read_polygon(coords)?]),
        "MultiPolygon" => coords.as_array()?.iter().map(read_polygon).collect(),
        _ => None,
    }
}

fn read_polygon(js: &JSValue) -> Option<Polygon> {
    js.as_array()?
        .iter()
        .map(|ring| -> Option<Vec<(f64, f64)>> {
            ring.as_array()?
                .iter()
                .map(|p| {
                    let p = p.as_array()?;
                    Some((p.first()?.as_f64()?, p.get(1)?.as_f64()?))
                })
                .collect()
        })
        .collect()
}

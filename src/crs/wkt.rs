//! Reader for the WKT1 (OGC and ESRI flavoured) found in shapefile `.prj`
//! sidecars.
//!
//! An explicit `AUTHORITY["EPSG", ...]` on the root wins. Otherwise the tree is
//! translated into a PROJ string covering the projections administrative
//! datasets are usually published in.

use std::fmt::Write;

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while};
use nom::character::complete::{alpha1, char, multispace0, none_of};
use nom::combinator::{all_consuming, map, recognize, value};
use nom::multi::{many0, separated_list0};
use nom::number::complete::double;
use nom::sequence::{delimited, pair};
use nom::{Finish, IResult};

use super::Crs;
use crate::error::{PipelineError, Result};

/// One `KEYWORD[...]` node of a WKT tree
#[derive(Debug, Clone, PartialEq)]
pub struct WktNode {
    pub keyword: String,
    pub values: Vec<WktValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WktValue {
    Node(WktNode),
    Text(String),
    Number(f64),
}

impl WktNode {
    /// First direct child with this keyword (case-insensitive)
    pub fn child(&self, keyword: &str) -> Option<&WktNode> {
        self.values.iter().find_map(|v| match v {
            WktValue::Node(n) if n.keyword.eq_ignore_ascii_case(keyword) => Some(n),
            _ => None,
        })
    }

    pub fn children<'a>(&'a self, keyword: &'a str) -> impl Iterator<Item = &'a WktNode> + 'a {
        self.values.iter().filter_map(move |v| match v {
            WktValue::Node(n) if n.keyword.eq_ignore_ascii_case(keyword) => Some(n),
            _ => None,
        })
    }

    /// The leading quoted name, e.g. `"GRS_1980"` in `SPHEROID["GRS_1980",...]`
    pub fn name(&self) -> Option<&str> {
        match self.values.first() {
            Some(WktValue::Text(t)) => Some(t),
            _ => None,
        }
    }

    pub fn number(&self, index: usize) -> Option<f64> {
        match self.values.get(index) {
            Some(WktValue::Number(n)) => Some(*n),
            Some(WktValue::Text(t)) => t.parse().ok(),
            _ => None,
        }
    }
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn keyword(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alpha1,
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

/// `"..."` with `""` standing for a literal quote
fn quoted(input: &str) -> IResult<&str, String> {
    map(
        delimited(
            char('"'),
            many0(alt((value('"', tag("\"\"")), none_of("\"")))),
            char('"'),
        ),
        |chars: Vec<char>| chars.into_iter().collect(),
    )(input)
}

fn wkt_value(input: &str) -> IResult<&str, WktValue> {
    ws(alt((
        map(quoted, WktValue::Text),
        map(node, WktValue::Node),
        map(double, WktValue::Number),
        // Bare enum values such as the EAST in AXIS["X",EAST]
        map(keyword, |k| WktValue::Text(k.to_string())),
    )))(input)
}

fn node(input: &str) -> IResult<&str, WktNode> {
    let (input, name) = ws(keyword)(input)?;
    let (input, values) = alt((
        delimited(
            char('['),
            separated_list0(char(','), wkt_value),
            ws(char(']')),
        ),
        delimited(
            char('('),
            separated_list0(char(','), wkt_value),
            ws(char(')')),
        ),
    ))(input)?;

    Ok((
        input,
        WktNode {
            keyword: name.to_string(),
            values,
        },
    ))
}

/// Parse a WKT string into its node tree
pub fn parse_wkt(input: &str) -> Result<WktNode> {
    all_consuming(ws(node))(input)
        .finish()
        .map(|(_, root)| root)
        .map_err(|e| {
            let at: String = e.input.chars().take(24).collect();
            PipelineError::parse(
                "WKT",
                format!("{:?} at byte {} ('{}')", e.code, input.len() - e.input.len(), at),
            )
        })
}

/// Lowercased name with ESRI's `D_` / `GCS_` decorations removed
fn normalize(name: &str) -> String {
    let lower = name.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    lower
        .strip_prefix("d_")
        .or_else(|| lower.strip_prefix("gcs_"))
        .unwrap_or(&lower)
        .to_string()
}

fn epsg_authority(node: &WktNode) -> Option<u16> {
    let authority = node.child("AUTHORITY").or_else(|| node.child("ID"))?;
    if !authority.name()?.eq_ignore_ascii_case("epsg") {
        return None;
    }
    match authority.values.get(1)? {
        WktValue::Text(t) => t.trim().parse().ok(),
        WktValue::Number(n) if *n >= 0.0 && *n <= u16::MAX as f64 => Some(*n as u16),
        _ => None,
    }
}

/// Datum/ellipsoid part of a PROJ string, from a GEOGCS node
fn datum_params(geogcs: &WktNode) -> Result<String> {
    let datum = geogcs
        .child("DATUM")
        .ok_or_else(|| PipelineError::parse("WKT", "GEOGCS without DATUM"))?;

    let mut out = match datum.name().map(normalize).as_deref() {
        Some("wgs_1984") | Some("wgs84") | Some("world_geodetic_system_1984") => {
            "+datum=WGS84".to_string()
        }
        Some("north_american_1983") | Some("north_american_datum_1983") => {
            "+datum=NAD83".to_string()
        }
        _ => {
            let spheroid = datum
                .child("SPHEROID")
                .or_else(|| datum.child("ELLIPSOID"))
                .ok_or_else(|| PipelineError::parse("WKT", "DATUM without SPHEROID"))?;
            let a = spheroid
                .number(1)
                .ok_or_else(|| PipelineError::parse("WKT", "SPHEROID without semi-major axis"))?;
            let rf = spheroid.number(2).unwrap_or(0.0);
            if rf == 0.0 {
                format!("+a={} +b={}", a, a)
            } else {
                format!("+a={} +rf={}", a, rf)
            }
        }
    };

    if let Some(pm) = geogcs.child("PRIMEM").and_then(|p| p.number(1)) {
        if pm != 0.0 {
            let _ = write!(out, " +pm={}", pm);
        }
    }

    Ok(out)
}

/// Look up a PARAMETER by any of its aliases
fn parameter(projcs: &WktNode, aliases: &[&str]) -> Option<f64> {
    projcs.children("PARAMETER").find_map(|p| {
        let name = normalize(p.name()?);
        if aliases.contains(&name.as_str()) {
            p.number(1)
        } else {
            None
        }
    })
}

const CENTRAL_MERIDIAN: &[&str] = &[
    "central_meridian",
    "longitude_of_origin",
    "longitude_of_center",
    "longitude_of_natural_origin",
];
const LATITUDE_OF_ORIGIN: &[&str] = &[
    "latitude_of_origin",
    "latitude_of_center",
    "latitude_of_natural_origin",
];

fn projected_params(projcs: &WktNode) -> Result<String> {
    let projection = projcs
        .child("PROJECTION")
        .and_then(|p| p.name())
        .map(normalize)
        .ok_or_else(|| PipelineError::parse("WKT", "PROJCS without PROJECTION"))?;

    let to_meter = projcs.child("UNIT").and_then(|u| u.number(1)).unwrap_or(1.0);
    let false_easting = parameter(projcs, &["false_easting"]).unwrap_or(0.0) * to_meter;
    let false_northing = parameter(projcs, &["false_northing"]).unwrap_or(0.0) * to_meter;
    let lon_0 = parameter(projcs, CENTRAL_MERIDIAN).unwrap_or(0.0);
    let origin = parameter(projcs, LATITUDE_OF_ORIGIN);
    let lat_0 = origin.unwrap_or(0.0);
    let scale = parameter(projcs, &["scale_factor", "scale_factor_at_natural_origin"]);
    let sp1 = parameter(projcs, &["standard_parallel_1"]);
    let sp2 = parameter(projcs, &["standard_parallel_2"]);

    let mut out = match projection.as_str() {
        "lambert_conformal_conic" | "lambert_conformal_conic_2sp" if sp2.is_some() => format!(
            "+proj=lcc +lat_1={} +lat_2={} +lat_0={} +lon_0={}",
            sp1.unwrap_or(lat_0),
            sp2.unwrap_or(lat_0),
            lat_0,
            lon_0
        ),
        "lambert_conformal_conic"
        | "lambert_conformal_conic_1sp"
        | "lambert_conformal_conic_2sp" => {
            // Single standard parallel; the origin defaults onto it
            let lat_1 = sp1.unwrap_or(lat_0);
            format!(
                "+proj=lcc +lat_1={} +lat_0={} +lon_0={} +k_0={}",
                lat_1,
                origin.unwrap_or(lat_1),
                lon_0,
                scale.unwrap_or(1.0)
            )
        }
        "transverse_mercator" => format!(
            "+proj=tmerc +lat_0={} +lon_0={} +k_0={}",
            lat_0,
            lon_0,
            scale.unwrap_or(1.0)
        ),
        "mercator" | "mercator_1sp" | "mercator_2sp" => match sp1 {
            Some(lat_ts) => format!("+proj=merc +lat_ts={} +lon_0={}", lat_ts, lon_0),
            None => format!("+proj=merc +lon_0={} +k_0={}", lon_0, scale.unwrap_or(1.0)),
        },
        other => {
            return Err(PipelineError::parse(
                "WKT",
                format!("unsupported projection '{}'", other),
            ))
        }
    };

    let _ = write!(out, " +x_0={} +y_0={}", false_easting, false_northing);

    let geogcs = projcs
        .child("GEOGCS")
        .ok_or_else(|| PipelineError::parse("WKT", "PROJCS without GEOGCS"))?;
    let _ = write!(out, " {}", datum_params(geogcs)?);

    if (to_meter - 1.0).abs() > f64::EPSILON {
        let _ = write!(out, " +to_meter={}", to_meter);
    }
    out.push_str(" +no_defs");

    Ok(out)
}

/// Translate a parsed WKT tree into a [`Crs`]
pub fn crs_from_node(root: &WktNode) -> Result<Crs> {
    if let Some(code) = epsg_authority(root) {
        return Ok(Crs::Epsg(code));
    }

    match root.keyword.to_ascii_uppercase().as_str() {
        "PROJCS" => projected_params(root).map(Crs::Proj),
        "GEOGCS" => {
            let datum = datum_params(root)?;
            Ok(match datum.as_str() {
                "+datum=WGS84" => Crs::WGS84,
                "+datum=NAD83" => Crs::Epsg(4269),
                _ => Crs::Proj(format!("+proj=longlat {} +no_defs", datum)),
            })
        }
        other => Err(PipelineError::parse(
            "WKT",
            format!("unsupported root keyword '{}'", other),
        )),
    }
}

/// Parse the contents of a `.prj` file
pub fn crs_from_wkt(wkt: &str) -> Result<Crs> {
    crs_from_node(&parse_wkt(wkt)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::Reprojector;
    use geo::Coord;

    /// NYC borough boundaries as published by the Department of City Planning
    const NYBB_PRJ: &str = r#"PROJCS["NAD_1983_StatePlane_New_York_Long_Island_FIPS_3104_Feet",GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Lambert_Conformal_Conic"],PARAMETER["False_Easting",984250.0],PARAMETER["False_Northing",0.0],PARAMETER["Central_Meridian",-74.0],PARAMETER["Standard_Parallel_1",40.66666666666666],PARAMETER["Standard_Parallel_2",41.03333333333333],PARAMETER["Latitude_Of_Origin",40.16666666666666],UNIT["Foot_US",0.3048006096012192]]"#;

    #[test]
    fn test_parse_tree() {
        let root = parse_wkt(NYBB_PRJ).unwrap();
        assert_eq!(root.keyword, "PROJCS");
        assert_eq!(
            root.name(),
            Some("NAD_1983_StatePlane_New_York_Long_Island_FIPS_3104_Feet")
        );
        assert_eq!(root.children("PARAMETER").count(), 6);
        let spheroid = root
            .child("GEOGCS")
            .and_then(|g| g.child("DATUM"))
            .and_then(|d| d.child("SPHEROID"))
            .unwrap();
        assert_eq!(spheroid.number(1), Some(6378137.0));
    }

    #[test]
    fn test_bare_identifiers_and_parens() {
        let root = parse_wkt(r#"GEOGCS("WGS 84",AXIS["Lat",NORTH],DATUM("WGS_1984"))"#).unwrap();
        let axis = root.child("AXIS").unwrap();
        assert_eq!(axis.values[1], WktValue::Text("NORTH".into()));
    }

    #[test]
    fn test_escaped_quote() {
        let root = parse_wkt(r#"UNIT["foot ""US""",0.3048006096012192]"#).unwrap();
        assert_eq!(root.name(), Some(r#"foot "US""#));
    }

    #[test]
    fn test_malformed() {
        assert!(parse_wkt("PROJCS[\"x\"").is_err());
        assert!(parse_wkt("PROJCS[\"x\"]]").is_err());
        assert!(parse_wkt("").is_err());
    }

    #[test]
    fn test_authority_wins() {
        let wkt = r#"PROJCS["NAD83 / New York Long Island (ftUS)",GEOGCS["NAD83",DATUM["North_American_Datum_1983",SPHEROID["GRS 1980",6378137,298.257222101]]],PROJECTION["Lambert_Conformal_Conic_2SP"],UNIT["US survey foot",0.3048006096012192],AUTHORITY["EPSG","2263"]]"#;
        assert_eq!(crs_from_wkt(wkt).unwrap(), Crs::Epsg(2263));
    }

    #[test]
    fn test_esri_state_plane_to_proj() {
        let crs = crs_from_wkt(NYBB_PRJ).unwrap();
        let Crs::Proj(defn) = &crs else {
            panic!("expected PROJ string, got {:?}", crs);
        };
        assert!(defn.starts_with("+proj=lcc"));
        assert!(defn.contains("+datum=NAD83"));
        assert!(defn.contains("+to_meter=0.3048006096012192"));
        // 984250 US feet
        assert!(defn.contains("+x_0=300000"));
    }

    #[test]
    fn test_state_plane_origin() {
        let crs = crs_from_wkt(NYBB_PRJ).unwrap();
        let to_plane = Reprojector::new(&Crs::WGS84, &crs).unwrap();
        let origin = to_plane
            .transform_coord(Coord {
                x: -74.0,
                y: 40.16666666666666,
            })
            .unwrap();
        assert!((origin.x - 984250.0).abs() < 0.01, "x = {}", origin.x);
        assert!(origin.y.abs() < 0.01, "y = {}", origin.y);
    }

    #[test]
    fn test_matches_epsg_definition() {
        let from_wkt = Reprojector::new(&crs_from_wkt(NYBB_PRJ).unwrap(), &Crs::WGS84).unwrap();
        let from_epsg = Reprojector::new(&Crs::Epsg(2263), &Crs::WGS84).unwrap();

        // Roughly midtown Manhattan
        let p = Coord {
            x: 988_000.0,
            y: 212_000.0,
        };
        let a = from_wkt.transform_coord(p).unwrap();
        let b = from_epsg.transform_coord(p).unwrap();
        assert!((a.x - b.x).abs() < 1e-6 && (a.y - b.y).abs() < 1e-6);
        assert!((-74.1..-73.9).contains(&a.x), "lon = {}", a.x);
        assert!((40.6..40.9).contains(&a.y), "lat = {}", a.y);
    }

    #[test]
    fn test_geographic_roots() {
        let wgs84 = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
        assert_eq!(crs_from_wkt(wgs84).unwrap(), Crs::WGS84);

        let nad83 = r#"GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137.0,298.257222101]]]"#;
        assert_eq!(crs_from_wkt(nad83).unwrap(), Crs::Epsg(4269));

        let sphere = r#"GEOGCS["Sphere",DATUM["D_Sphere",SPHEROID["Sphere",6371000.0,0.0]]]"#;
        assert_eq!(
            crs_from_wkt(sphere).unwrap(),
            Crs::Proj("+proj=longlat +a=6371000 +b=6371000 +no_defs".into())
        );
    }

    #[test]
    fn test_child_lookup_with_owned_keyword() {
        let root = parse_wkt(NYBB_PRJ).unwrap();
        let datum = {
            let key = String::from("geogcs");
            root.child(&key)
        }
        .and_then(|g| g.child("DATUM"))
        .unwrap();
        assert_eq!(datum.name(), Some("D_North_American_1983"));
    }

    #[test]
    fn test_whitespace_between_tokens() {
        let root = parse_wkt(
            "GEOGCS [ \"WGS 84\" ,\n  DATUM [\"WGS_1984\", SPHEROID[\"WGS 84\", 6378137 , 298.257223563]] ]\n",
        )
        .unwrap();
        let spheroid = root.child("DATUM").and_then(|d| d.child("SPHEROID")).unwrap();
        assert_eq!(spheroid.number(2), Some(298.257223563));
        assert_eq!(crs_from_node(&root).unwrap(), Crs::WGS84);
    }

    const LCC_GEOGCS: &str = r#"GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137.0,298.257222101]]]"#;

    #[test]
    fn test_lcc_2sp_with_single_parallel() {
        let wkt = format!(
            r#"PROJCS["x",{},PROJECTION["Lambert_Conformal_Conic_2SP"],PARAMETER["Central_Meridian",-74.0],PARAMETER["Standard_Parallel_1",40.5],PARAMETER["Latitude_Of_Origin",40.0],UNIT["Meter",1.0]]"#,
            LCC_GEOGCS
        );
        let Crs::Proj(defn) = crs_from_wkt(&wkt).unwrap() else {
            panic!("expected PROJ string");
        };
        assert!(defn.starts_with("+proj=lcc +lat_1=40.5 +lat_0=40 "), "{}", defn);
    }

    #[test]
    fn test_lcc_1sp_uses_latitude_of_origin() {
        let wkt = format!(
            r#"PROJCS["x",{},PROJECTION["Lambert_Conformal_Conic_1SP"],PARAMETER["Central_Meridian",-74.0],PARAMETER["Standard_Parallel_1",41.0],PARAMETER["Latitude_Of_Origin",40.5],PARAMETER["Scale_Factor",0.9999],UNIT["Meter",1.0]]"#,
            LCC_GEOGCS
        );
        let Crs::Proj(defn) = crs_from_wkt(&wkt).unwrap() else {
            panic!("expected PROJ string");
        };
        assert!(defn.contains("+lat_1=41 +lat_0=40.5 "), "{}", defn);
        assert!(defn.contains("+k_0=0.9999"), "{}", defn);

        // Without a latitude of origin the standard parallel stands in
        let wkt = wkt.replace(r#"PARAMETER["Latitude_Of_Origin",40.5],"#, "");
        let Crs::Proj(defn) = crs_from_wkt(&wkt).unwrap() else {
            panic!("expected PROJ string");
        };
        assert!(defn.contains("+lat_1=41 +lat_0=41 "), "{}", defn);
    }

    #[test]
    fn test_unsupported_projection() {
        let wkt = r#"PROJCS["x",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]]],PROJECTION["Robinson"],UNIT["Meter",1.0]]"#;
        assert!(matches!(
            crs_from_wkt(wkt),
            Err(PipelineError::Parse { .. })
        ));
    }
}

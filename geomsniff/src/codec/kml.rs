//! Codec KML (fragments de géométrie)
//!
//! Le fragment est lu avec quick-xml en un petit arbre d'éléments. Les noms
//! sont comparés sans préfixe de namespace et sans casse.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::codec::{collect_parts, parse_number, MAX_DEPTH};
use crate::geometry::{Coord, Geometry};
use crate::types::Parsed;
use crate::ParseError;

/// Éléments de géométrie reconnus (en minuscules)
pub const GEOMETRY_TAGS: [&str; 5] = [
    "point",
    "linestring",
    "linearring",
    "polygon",
    "multigeometry",
];

/// Élément XML simplifié
#[derive(Debug, Default)]
struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn new(name: &[u8]) -> Self {
        Self {
            name: String::from_utf8_lossy(name).to_ascii_lowercase(),
            ..Default::default()
        }
    }

    fn is_geometry(&self) -> bool {
        GEOMETRY_TAGS.contains(&self.name.as_str())
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Premier descendant (parcours en profondeur) qui vérifie le prédicat
    fn find(&self, pred: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        for child in &self.children {
            if pred(child) {
                return Some(child);
            }
            if let Some(found) = child.find(pred) {
                return Some(found);
            }
        }
        None
    }
}

/// Parse la première géométrie KML trouvée dans le fragment
pub fn parse(value: &str) -> Result<Parsed, ParseError> {
    let root = read_tree(value)?;

    let geometry = root
        .find(&Element::is_geometry)
        .ok_or_else(|| ParseError::syntax(0, "no KML geometry element"))?;

    Ok(Parsed::new(convert(geometry, 0)?))
}

fn read_tree(value: &str) -> Result<Element, ParseError> {
    let mut reader = Reader::from_str(value);
    let mut stack = vec![Element::default()];

    loop {
        let position = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if stack.len() > MAX_DEPTH {
                    return Err(ParseError::syntax(position, "element nesting too deep"));
                }
                stack.push(Element::new(e.local_name().as_ref()));
            }
            Ok(Event::Empty(e)) => {
                let element = Element::new(e.local_name().as_ref());
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(element);
                }
            }
            Ok(Event::End(_)) => {
                if stack.len() < 2 {
                    return Err(ParseError::syntax(position, "unexpected closing tag"));
                }
                if let Some(element) = stack.pop() {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(element);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| ParseError::syntax(position, e.to_string()))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ParseError::syntax(position, e.to_string())),
        }
    }

    if stack.len() != 1 {
        return Err(ParseError::syntax(value.len(), "unclosed element"));
    }
    Ok(stack.pop().unwrap_or_default())
}

fn convert(element: &Element, depth: usize) -> Result<Geometry, ParseError> {
    if depth > MAX_DEPTH {
        return Err(ParseError::syntax(0, "MultiGeometry nesting too deep"));
    }

    match element.name.as_str() {
        "point" => {
            let coords = coordinates(element)?;
            coords
                .into_iter()
                .next()
                .map(Geometry::Point)
                .ok_or_else(|| ParseError::syntax(0, "empty coordinates"))
        }
        "linestring" => Ok(Geometry::LineString(coordinates(element)?)),
        "linearring" => Ok(Geometry::Polygon(vec![coordinates(element)?])),
        "polygon" => polygon(element),
        "multigeometry" => {
            let parts = element
                .children
                .iter()
                .filter(|c| c.is_geometry())
                .map(|c| convert(c, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(collect_parts(parts))
        }
        other => Err(ParseError::syntax(0, format!("unsupported element <{}>", other))),
    }
}

fn polygon(element: &Element) -> Result<Geometry, ParseError> {
    let ring_of = |boundary: &Element| -> Result<Vec<Coord>, ParseError> {
        let ring = boundary
            .child("linearring")
            .ok_or_else(|| ParseError::syntax(0, "boundary without LinearRing"))?;
        coordinates(ring)
    };

    let outer = element
        .child("outerboundaryis")
        .ok_or_else(|| ParseError::syntax(0, "Polygon without outerBoundaryIs"))?;

    let mut rings = vec![ring_of(outer)?];
    for inner in element.children.iter().filter(|c| c.name == "innerboundaryis") {
        rings.push(ring_of(inner)?);
    }

    Ok(Geometry::Polygon(rings))
}

/// Lit le texte `<coordinates>` en tuples `x,y[,z]`
fn coordinates(element: &Element) -> Result<Vec<Coord>, ParseError> {
    let node = element
        .child("coordinates")
        .or_else(|| element.find(&|e: &Element| e.name == "coordinates"))
        .ok_or_else(|| ParseError::syntax(0, "missing <coordinates>"))?;

    let text = node.text.trim();
    if text.is_empty() {
        return Err(ParseError::syntax(0, "empty coordinates"));
    }

    text.split_whitespace().map(coordinate_tuple).collect()
}

fn coordinate_tuple(tuple: &str) -> Result<Coord, ParseError> {
    let values = tuple
        .split(',')
        .map(parse_number)
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(|| ParseError::syntax(0, format!("invalid coordinate tuple '{}'", tuple)))?;

    match values.as_slice() {
        [x, y] => Ok(Coord::xy(*x, *y)),
        [x, y, z] => Ok(Coord::xyz(*x, *y, *z)),
        _ => Err(ParseError::syntax(
            0,
            format!("coordinate tuple '{}' needs 2 or 3 values", tuple),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        let parsed = parse("<Point><coordinates>2.35,48.85</coordinates></Point>").unwrap();
        assert_eq!(parsed.geometry, Geometry::Point(Coord::xy(2.35, 48.85)));
        assert_eq!(parsed.srid, None);
    }

    #[test]
    fn test_parse_point_with_altitude() {
        let parsed = parse("<Point><coordinates> 1,2,30 </coordinates></Point>").unwrap();
        assert_eq!(parsed.geometry, Geometry::Point(Coord::xyz(1.0, 2.0, 30.0)));
    }

    #[test]
    fn test_parse_linestring_multiline_text() {
        let parsed = parse(
            "<LineString>\n  <coordinates>\n    0,0\n    1,1\n    2,0\n  </coordinates>\n</LineString>",
        )
        .unwrap();
        assert_eq!(
            parsed.geometry,
            Geometry::LineString(vec![
                Coord::xy(0.0, 0.0),
                Coord::xy(1.0, 1.0),
                Coord::xy(2.0, 0.0),
            ])
        );
    }

    #[test]
    fn test_parse_polygon_with_hole() {
        let kml = "<Polygon>\
            <outerBoundaryIs><LinearRing><coordinates>0,0 10,0 10,10 0,10 0,0</coordinates></LinearRing></outerBoundaryIs>\
            <innerBoundaryIs><LinearRing><coordinates>2,2 4,2 4,4 2,2</coordinates></LinearRing></innerBoundaryIs>\
            </Polygon>";
        match parse(kml).unwrap().geometry {
            Geometry::Polygon(rings) => {
                assert_eq!(rings.len(), 2);
                assert_eq!(rings[0].len(), 5);
                assert_eq!(rings[1].len(), 4);
            }
            other => panic!("Expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_namespace_prefix_and_case() {
        let parsed = parse(
            r#"<kml:point xmlns:kml="http://www.opengis.net/kml/2.2"><kml:coordinates>1,2</kml:coordinates></kml:point>"#,
        )
        .unwrap();
        assert_eq!(parsed.geometry, Geometry::Point(Coord::xy(1.0, 2.0)));
    }

    #[test]
    fn test_placemark_wrapper() {
        let parsed = parse(
            "<Placemark><name>a</name><Point><coordinates>5,47</coordinates></Point></Placemark>",
        )
        .unwrap();
        assert_eq!(parsed.geometry, Geometry::Point(Coord::xy(5.0, 47.0)));
    }

    #[test]
    fn test_multigeometry() {
        let parsed = parse(
            "<MultiGeometry>\
               <Point><coordinates>0,0</coordinates></Point>\
               <Point><coordinates>1,1</coordinates></Point>\
             </MultiGeometry>",
        )
        .unwrap();
        assert!(matches!(parsed.geometry, Geometry::MultiPoint(ref p) if p.len() == 2));

        let parsed = parse(
            "<MultiGeometry>\
               <Point><coordinates>0,0</coordinates></Point>\
               <LineString><coordinates>0,0 1,1</coordinates></LineString>\
             </MultiGeometry>",
        )
        .unwrap();
        assert!(matches!(parsed.geometry, Geometry::GeometryCollection(ref g) if g.len() == 2));
    }

    #[test]
    fn test_bare_linear_ring() {
        let parsed =
            parse("<LinearRing><coordinates>0,0 1,0 1,1 0,0</coordinates></LinearRing>").unwrap();
        assert!(matches!(parsed.geometry, Geometry::Polygon(ref r) if r.len() == 1));
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let value = format!(
            "{}<Point><coordinates>1,2</coordinates></Point>{}",
            "<a>".repeat(20_000),
            "</a>".repeat(20_000)
        );
        assert!(matches!(parse(&value), Err(ParseError::SyntaxError { .. })));

        // une imbrication raisonnable reste acceptée
        let value = format!(
            "{}<Point><coordinates>1,2</coordinates></Point>{}",
            "<Folder>".repeat(10),
            "</Folder>".repeat(10)
        );
        assert!(parse(&value).is_ok());
    }

    #[test]
    fn test_errors() {
        // coordonnées absentes
        assert!(matches!(
            parse("<Point></Point>"),
            Err(ParseError::SyntaxError { .. })
        ));
        // coordonnées vides
        assert!(matches!(
            parse("<Point><coordinates>  </coordinates></Point>"),
            Err(ParseError::SyntaxError { .. })
        ));
        // tuple non numérique
        assert!(matches!(
            parse("<Point><coordinates>a,b</coordinates></Point>"),
            Err(ParseError::SyntaxError { .. })
        ));
        // XML mal formé
        assert!(matches!(
            parse("<Point><coordinates>1,2</Point>"),
            Err(ParseError::SyntaxError { .. })
        ));
        // aucune géométrie
        assert!(matches!(
            parse("<Placemark><name>x</name></Placemark>"),
            Err(ParseError::SyntaxError { .. })
        ));
    }
}

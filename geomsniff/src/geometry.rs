//! Modèle de géométrie commun à tous les codecs
//!
//! Arbre possédé: chaque conteneur possède ses enfants par valeur, aucune
//! référence partagée. Une géométrie n'est jamais modifiée après construction.

/// Coordonnée 2D avec altitude optionnelle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl Coord {
    /// Coordonnée XY
    pub const fn xy(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    /// Coordonnée XYZ
    pub const fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z) }
    }

    /// Égalité stricte sur X/Y (l'altitude est ignorée)
    pub fn same_xy(&self, other: &Coord) -> bool {
        self.x == other.x && self.y == other.y
    }
}

impl From<(f64, f64)> for Coord {
    fn from((x, y): (f64, f64)) -> Self {
        Self::xy(x, y)
    }
}

/// Géométrie normalisée produite par les codecs
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coord),
    LineString(Vec<Coord>),
    /// Anneaux: le premier est l'extérieur, les suivants les trous
    Polygon(Vec<Vec<Coord>>),
    MultiPoint(Vec<Coord>),
    MultiLineString(Vec<Vec<Coord>>),
    MultiPolygon(Vec<Vec<Vec<Coord>>>),
    GeometryCollection(Vec<Geometry>),
}

impl Geometry {
    /// Nom du type, tel qu'écrit en GeoJSON
    pub fn geometry_type(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::LineString(_) => "LineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::MultiLineString(_) => "MultiLineString",
            Geometry::MultiPolygon(_) => "MultiPolygon",
            Geometry::GeometryCollection(_) => "GeometryCollection",
        }
    }

    /// Vrai si la géométrie ne contient aucune coordonnée
    pub fn is_empty(&self) -> bool {
        self.coord_count() == 0
    }

    /// Nombre total de coordonnées
    pub fn coord_count(&self) -> usize {
        match self {
            Geometry::Point(_) => 1,
            Geometry::LineString(coords) | Geometry::MultiPoint(coords) => coords.len(),
            Geometry::Polygon(rings) | Geometry::MultiLineString(rings) => {
                rings.iter().map(Vec::len).sum()
            }
            Geometry::MultiPolygon(polygons) => polygons
                .iter()
                .flat_map(|rings| rings.iter())
                .map(Vec::len)
                .sum(),
            Geometry::GeometryCollection(children) => {
                children.iter().map(Geometry::coord_count).sum()
            }
        }
    }

    /// Vrai si au moins une coordonnée porte une altitude
    pub fn has_z(&self) -> bool {
        fn any_z(coords: &[Coord]) -> bool {
            coords.iter().any(|c| c.z.is_some())
        }

        match self {
            Geometry::Point(c) => c.z.is_some(),
            Geometry::LineString(coords) | Geometry::MultiPoint(coords) => any_z(coords),
            Geometry::Polygon(rings) | Geometry::MultiLineString(rings) => {
                rings.iter().any(|r| any_z(r))
            }
            Geometry::MultiPolygon(polygons) => {
                polygons.iter().flatten().any(|r| any_z(r))
            }
            Geometry::GeometryCollection(children) => children.iter().any(Geometry::has_z),
        }
    }

    /// Conversion vers les types `geo` (l'altitude est perdue)
    pub fn to_geo(&self) -> geo::Geometry<f64> {
        match self {
            Geometry::Point(c) => geo::Geometry::Point(geo::Point::new(c.x, c.y)),
            Geometry::LineString(coords) => geo::Geometry::LineString(to_geo_line(coords)),
            Geometry::Polygon(rings) => geo::Geometry::Polygon(to_geo_polygon(rings)),
            Geometry::MultiPoint(coords) => geo::Geometry::MultiPoint(geo::MultiPoint::new(
                coords.iter().map(|c| geo::Point::new(c.x, c.y)).collect(),
            )),
            Geometry::MultiLineString(lines) => geo::Geometry::MultiLineString(
                geo::MultiLineString::new(lines.iter().map(|l| to_geo_line(l)).collect()),
            ),
            Geometry::MultiPolygon(polygons) => geo::Geometry::MultiPolygon(
                geo::MultiPolygon::new(polygons.iter().map(|p| to_geo_polygon(p)).collect()),
            ),
            Geometry::GeometryCollection(children) => geo::Geometry::GeometryCollection(
                geo::GeometryCollection::new_from(children.iter().map(Geometry::to_geo).collect()),
            ),
        }
    }

    /// Conversion depuis les types `geo` (géométries 2D)
    pub fn from_geo(geom: &geo::Geometry<f64>) -> Option<Self> {
        fn coords_of(line: &geo::LineString<f64>) -> Vec<Coord> {
            line.coords().map(|c| Coord::xy(c.x, c.y)).collect()
        }

        fn rings_of(polygon: &geo::Polygon<f64>) -> Vec<Vec<Coord>> {
            std::iter::once(polygon.exterior())
                .chain(polygon.interiors())
                .map(coords_of)
                .collect()
        }

        let converted = match geom {
            geo::Geometry::Point(p) => Geometry::Point(Coord::xy(p.x(), p.y())),
            geo::Geometry::LineString(l) => Geometry::LineString(coords_of(l)),
            geo::Geometry::Polygon(p) => Geometry::Polygon(rings_of(p)),
            geo::Geometry::MultiPoint(mp) => {
                Geometry::MultiPoint(mp.iter().map(|p| Coord::xy(p.x(), p.y())).collect())
            }
            geo::Geometry::MultiLineString(ml) => {
                Geometry::MultiLineString(ml.iter().map(coords_of).collect())
            }
            geo::Geometry::MultiPolygon(mp) => {
                Geometry::MultiPolygon(mp.iter().map(rings_of).collect())
            }
            geo::Geometry::GeometryCollection(gc) => Geometry::GeometryCollection(
                gc.iter().map(Geometry::from_geo).collect::<Option<Vec<_>>>()?,
            ),
            // Line, Rect et Triangle n'existent dans aucun des formats d'entrée
            _ => return None,
        };
        Some(converted)
    }

    /// Compare deux géométries avec une tolérance sur les coordonnées
    pub fn approx_eq(&self, other: &Geometry, epsilon: f64) -> bool {
        fn coord_eq(a: &Coord, b: &Coord, eps: f64) -> bool {
            let z_eq = match (a.z, b.z) {
                (Some(za), Some(zb)) => (za - zb).abs() <= eps,
                (None, None) => true,
                _ => false,
            };
            (a.x - b.x).abs() <= eps && (a.y - b.y).abs() <= eps && z_eq
        }

        fn line_eq(a: &[Coord], b: &[Coord], eps: f64) -> bool {
            a.len() == b.len() && a.iter().zip(b).all(|(ca, cb)| coord_eq(ca, cb, eps))
        }

        fn rings_eq(a: &[Vec<Coord>], b: &[Vec<Coord>], eps: f64) -> bool {
            a.len() == b.len() && a.iter().zip(b).all(|(ra, rb)| line_eq(ra, rb, eps))
        }

        match (self, other) {
            (Geometry::Point(a), Geometry::Point(b)) => coord_eq(a, b, epsilon),
            (Geometry::LineString(a), Geometry::LineString(b))
            | (Geometry::MultiPoint(a), Geometry::MultiPoint(b)) => line_eq(a, b, epsilon),
            (Geometry::Polygon(a), Geometry::Polygon(b))
            | (Geometry::MultiLineString(a), Geometry::MultiLineString(b)) => {
                rings_eq(a, b, epsilon)
            }
            (Geometry::MultiPolygon(a), Geometry::MultiPolygon(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(pa, pb)| rings_eq(pa, pb, epsilon))
            }
            (Geometry::GeometryCollection(a), Geometry::GeometryCollection(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(ga, gb)| ga.approx_eq(gb, epsilon))
            }
            _ => false,
        }
    }
}

fn to_geo_line(coords: &[Coord]) -> geo::LineString<f64> {
    geo::LineString::new(coords.iter().map(|c| geo::Coord { x: c.x, y: c.y }).collect())
}

fn to_geo_polygon(rings: &[Vec<Coord>]) -> geo::Polygon<f64> {
    let mut iter = rings.iter();
    let exterior = iter
        .next()
        .map(|r| to_geo_line(r))
        .unwrap_or_else(|| geo::LineString::new(Vec::new()));
    geo::Polygon::new(exterior, iter.map(|r| to_geo_line(r)).collect())
}

/// Ferme un anneau si le dernier point diffère du premier
pub(crate) fn close_ring(mut ring: Vec<Coord>) -> Vec<Coord> {
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last()) {
        if ring.len() > 1 && !first.same_xy(last) {
            ring.push(first);
        }
    }
    ring
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Coord> {
        vec![
            Coord::xy(0.0, 0.0),
            Coord::xy(1.0, 0.0),
            Coord::xy(1.0, 1.0),
            Coord::xy(0.0, 1.0),
            Coord::xy(0.0, 0.0),
        ]
    }

    #[test]
    fn test_coord_count_nested() {
        let geom = Geometry::GeometryCollection(vec![
            Geometry::Point(Coord::xy(1.0, 2.0)),
            Geometry::Polygon(vec![square()]),
        ]);
        assert_eq!(geom.coord_count(), 6);
        assert!(!geom.is_empty());
        assert!(Geometry::LineString(Vec::new()).is_empty());
    }

    #[test]
    fn test_to_geo_polygon() {
        let geom = Geometry::Polygon(vec![square()]);
        match geom.to_geo() {
            geo::Geometry::Polygon(p) => {
                assert_eq!(p.exterior().0.len(), 5);
                assert!(p.interiors().is_empty());
            }
            other => panic!("Expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_from_geo_round_trip() {
        let geom = Geometry::MultiLineString(vec![
            vec![Coord::xy(0.0, 0.0), Coord::xy(1.0, 1.0)],
            vec![Coord::xy(2.0, 2.0), Coord::xy(3.0, 3.0)],
        ]);
        let back = Geometry::from_geo(&geom.to_geo()).unwrap();
        assert_eq!(back, geom);
    }

    #[test]
    fn test_close_ring() {
        let open = vec![Coord::xy(0.0, 0.0), Coord::xy(1.0, 0.0), Coord::xy(1.0, 1.0)];
        let closed = close_ring(open);
        assert_eq!(closed.len(), 4);
        assert_eq!(closed[0], closed[3]);

        let already = close_ring(square());
        assert_eq!(already.len(), 5);
    }

    #[test]
    fn test_approx_eq_tolerance() {
        let a = Geometry::Point(Coord::xy(1.0, 2.0));
        let b = Geometry::Point(Coord::xy(1.0 + 1e-12, 2.0));
        assert!(a.approx_eq(&b, 1e-9));
        assert!(!a.approx_eq(&Geometry::Point(Coord::xyz(1.0, 2.0, 0.0)), 1e-9));
    }
}
